//! Expands placeholder tokens such as `{title}` or `{any}` into regex groups.

use regex::Regex;

pub const ANY: &str = "any";
pub const TITLE: &str = "title";
pub const LINK: &str = "link";
pub const DESCRIPTION: &str = "description";
pub const PUBDATE: &str = "pubdate";

pub const YEAR: &str = "year";
pub const MONTH: &str = "month";
pub const DAY: &str = "day";
pub const HOUR: &str = "hour";
pub const MINUTE: &str = "minute";
pub const SECOND: &str = "second";

/// Unnamed lazy wildcard that `{any}` expands to.
const ANY_REGEX: &str = "(?s:.*?)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupOptions {
    pub non_empty: bool,
    pub non_greedy: bool,
}

/// The role a pattern plays, which decides the tokens it may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Index,
    Content,
    Filter,
    PubDate,
}

impl PatternKind {
    pub fn tokens(self) -> &'static [&'static str] {
        match self {
            PatternKind::Index => &[TITLE, LINK, DESCRIPTION, PUBDATE],
            PatternKind::Content => &[DESCRIPTION, PUBDATE],
            PatternKind::Filter => &[],
            PatternKind::PubDate => &[YEAR, MONTH, DAY, HOUR, MINUTE, SECOND],
        }
    }

    pub fn options(self) -> GroupOptions {
        match self {
            PatternKind::Index | PatternKind::Filter => GroupOptions {
                non_empty: true,
                non_greedy: true,
            },
            PatternKind::Content => GroupOptions {
                non_empty: false,
                non_greedy: true,
            },
            // Date fields are short and usually separated by literals, so a
            // greedy group backtracks onto the right boundary.
            PatternKind::PubDate => GroupOptions {
                non_empty: true,
                non_greedy: false,
            },
        }
    }
}

pub fn placeholder(name: &str) -> String {
    format!("{{{name}}}")
}

/// Named group matching any character, newlines included.
pub fn group_regex(name: &str, options: GroupOptions) -> String {
    let repeat = if options.non_empty { "+" } else { "*" };
    let lazy = if options.non_greedy { "?" } else { "" };
    format!("(?P<{name}>(?s:.{repeat}{lazy}))")
}

/// Replace `{any}` and every placeholder in `names` with its regex.
///
/// Unknown `{...}` fragments are left untouched.
pub fn expand(raw: &str, names: &[&str], options: GroupOptions) -> String {
    let mut expanded = raw.replace(&placeholder(ANY), ANY_REGEX);
    for name in names {
        expanded = expanded.replace(&placeholder(name), &group_regex(name, options));
    }
    expanded
}

pub fn compile(raw: &str, kind: PatternKind) -> Result<Regex, regex::Error> {
    Regex::new(&expand(raw, kind.tokens(), kind.options()))
}
