//! `.myshrc`: aliases and user-defined functions.
//!
//! ```text
//! # comment
//! alias ll = reveal -l
//! home = hop ~
//!
//! func mk_hop()
//! {
//!     mkdir "$1"
//!     hop "$1"
//! }
//! ```

use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::errors::Result;

/// A word as far as alias substitution is concerned: operators delimit too.
static WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\s;&|<>]+").expect("static pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub body: Vec<String>,
}

impl Function {
    /// Body lines with `"$1"` and `$1` replaced by `args`.
    pub fn expand(&self, args: &str) -> Vec<String> {
        self.body
            .iter()
            .map(|line| line.replace("\"$1\"", args).replace("$1", args))
            .filter(|line| !line.trim().is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RcFile {
    aliases: HashMap<String, String>,
    functions: HashMap<String, Function>,
}

impl RcFile {
    /// Load definitions; a missing file yields an empty set.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let rc = Self::parse(&text);
                debug!(
                    path = %path.display(),
                    aliases = rc.aliases.len(),
                    functions = rc.functions.len(),
                    "loaded rc file"
                );
                Ok(rc)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no rc file");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse rc text. Malformed aliases and unclosed function bodies are
    /// skipped with a warning.
    pub fn parse(text: &str) -> Self {
        let mut rc = Self::default();
        let mut open: Option<Function> = None;

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(func) = open.as_mut() {
                match line {
                    "{" => {}
                    "}" => {
                        if let Some(done) = open.take() {
                            rc.functions.insert(done.name.clone(), done);
                        }
                    }
                    _ => func.body.push(line.to_string()),
                }
                continue;
            }

            if let Some(header) = line.strip_prefix("func ") {
                let name = header.trim().trim_end_matches('{').trim();
                let name = name.strip_suffix("()").unwrap_or(name).trim();
                if !name.is_empty() {
                    open = Some(Function {
                        name: name.to_string(),
                        body: Vec::new(),
                    });
                }
                continue;
            }

            if let Some((name, replacement)) = line.split_once('=') {
                let name = name.trim();
                let name = name.strip_prefix("alias ").unwrap_or(name).trim();
                rc.add_alias(name, replacement.trim());
            }
        }

        if let Some(unclosed) = open {
            warn!(function = %unclosed.name, "function body never closed; ignoring it");
        }
        rc
    }

    fn add_alias(&mut self, name: &str, replacement: &str) {
        if name.is_empty() || !WORD.find(name).is_some_and(|m| m.as_str() == name) {
            warn!(name, "ignoring malformed alias");
            return;
        }
        self.aliases.insert(name.to_string(), replacement.to_string());
    }

    /// Replace every word of `line` that names an alias. Replacements are not
    /// expanded again.
    pub fn substitute_aliases(&self, line: &str) -> String {
        if self.aliases.is_empty() {
            return line.to_string();
        }
        WORD.replace_all(line, |caps: &regex::Captures<'_>| {
            let word = &caps[0];
            self.aliases
                .get(word)
                .cloned()
                .unwrap_or_else(|| word.to_string())
        })
        .into_owned()
    }

    /// The user function called `name`, if one is defined.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }
}
