use crate::builtin::{Builtin, InvalidArgs};
use crate::errors::Result;
use crate::lexer::tokenize;
use crate::parser::{self, RedirectSpec};
use crate::rc::RcFile;

/// What a single unit of a command line turns out to be.
///
/// Decided once per unit, in this priority: pipeline, redirection, user
/// function, builtin, external program.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Empty,
    Pipeline(Vec<String>),
    Redirect(RedirectSpec),
    Function { name: String, args: String },
    Builtin(Builtin),
    /// A builtin whose arguments did not parse.
    Invalid(InvalidArgs),
    External(Vec<String>),
}

impl Command {
    pub fn classify(unit: &str, rc: &RcFile) -> Result<Command> {
        let unit = unit.trim();
        if parser::is_pipeline(unit) {
            return Ok(Command::Pipeline(parser::split_pipeline(unit)));
        }
        if parser::is_redirection(unit) {
            return parser::parse_redirection(unit).map(Command::Redirect);
        }

        let argv = tokenize(unit);
        let Some(first) = argv.first() else {
            return Ok(Command::Empty);
        };
        if rc.function(first).is_some() {
            let args = unit
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim())
                .unwrap_or_default();
            return Ok(Command::Function {
                name: first.clone(),
                args: args.to_string(),
            });
        }
        Ok(match Builtin::recognize(&argv) {
            Some(Ok(builtin)) => Command::Builtin(builtin),
            Some(Err(invalid)) => Command::Invalid(invalid),
            None => Command::External(argv),
        })
    }
}
