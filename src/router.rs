//! Command routing
//!
//! Classifies inbound text as a top-level command. Patterns are tried in a
//! fixed order and are written so that no text matches more than one of them.

use regex::Regex;
use std::fmt;

/// A recognised top-level command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `create <kind> poll`. The kind is validated by the handler so an
    /// unknown kind still gets a helpful reply.
    Create { kind: String },
    Cancel { uuid: String },
    Answer { uuid: String, answer: String },
    Show { uuid: String },
    ListActive,
    Help,
}

impl Command {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Create { .. } => "create",
            Command::Cancel { .. } => "cancel",
            Command::Answer { .. } => "answer",
            Command::Show { .. } => "show",
            Command::ListActive => "list_active",
            Command::Help => "help",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Create,
    Cancel,
    Answer,
    Show,
    ListActive,
    Help,
}

const ROUTES: [(Route, &str); 6] = [
    (Route::Create, r"^[cC]reate ([a-zA-Z]+) poll$"),
    (Route::Cancel, r"^[cC]ancel poll ([a-zA-Z0-9_-]+)$"),
    (Route::Answer, r"^[aA]nswer poll ([a-zA-Z0-9_-]+) (.+)$"),
    (Route::Show, r"^[sS]how poll ([a-zA-Z0-9_-]+)$"),
    (Route::ListActive, r"^[lL]ist active polls$"),
    (Route::Help, r"^[hH]elp\b"),
];

/// Ordered list of `(pattern, command)` pairs
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<(Route, Regex)>,
}

impl Router {
    pub fn new() -> Result<Self, regex::Error> {
        let routes = ROUTES
            .iter()
            .map(|(route, pattern)| Ok((*route, Regex::new(pattern)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { routes })
    }

    /// The command `text` invokes, or `None` for a dialogue reply
    pub fn classify(&self, text: &str) -> Option<Command> {
        let text = text.trim();
        self.routes.iter().find_map(|(route, re)| {
            let caps = re.captures(text)?;
            let group = |i: usize| caps.get(i).map_or(String::new(), |m| m.as_str().to_string());
            Some(match route {
                Route::Create => Command::Create { kind: group(1) },
                Route::Cancel => Command::Cancel { uuid: group(1) },
                Route::Answer => Command::Answer {
                    uuid: group(1),
                    answer: group(2),
                },
                Route::Show => Command::Show { uuid: group(1) },
                Route::ListActive => Command::ListActive,
                Route::Help => Command::Help,
            })
        })
    }

    #[cfg(test)]
    fn matching_routes(&self, text: &str) -> usize {
        self.routes.iter().filter(|(_, re)| re.is_match(text)).count()
    }
}
