use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use handlebars::Handlebars;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::rewrite::StatementBlock;

const TEMPLATE: &str = include_str!("../assets/test_fn.hbs");

/// The last member of the test contract followed by the contract's own brace.
const CLOSING: &str = "}\n}";

lazy_static! {
    static ref FN_DECL: Regex = Regex::new(r"\bfunction\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap();
}

/// How the end of the test contract is located.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InsertionStrategy {
    /// The last verbatim `}\n}`.
    #[default]
    Literal,
    /// The brace closing the last top-level container, ignoring comments and
    /// strings. Tolerates blank lines or comments before the final brace.
    Structural,
}

/// Where the new function goes: everything up to `head_end` is kept before
/// it, everything from `tail_start` after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionPoint {
    pub head_end: usize,
    pub tail_start: usize,
}

#[derive(Debug)]
pub struct Spliced {
    pub source: String,
    pub fn_name: String,
}

#[derive(Debug, Serialize)]
struct TemplateArgs<'a> {
    fn_name: &'a str,
    body: &'a str,
}

#[derive(Debug)]
pub struct Splicer {
    fn_prefix: String,
    strategy: InsertionStrategy,
    handlebars: Handlebars<'static>,
}

impl Splicer {
    pub fn new(fn_prefix: &str, strategy: InsertionStrategy) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_template_string("test_fn", TEMPLATE)?;

        Ok(Self {
            fn_prefix: fn_prefix.to_string(),
            strategy,
            handlebars,
        })
    }

    /// The name of the next test function: the prefix plus the number of
    /// `function` occurrences in the file, bumped past any name already
    /// declared.
    pub fn next_test_name(&self, source: &str) -> String {
        let declared = declared_fn_names(source);
        let count = count_fn_keywords(source);

        let mut idx = count;
        while declared.iter().any(|name| *name == format!("{}{}", self.fn_prefix, idx)) {
            idx += 1;
        }
        if idx != count {
            warn!("{}{} is already declared, using {}{}", self.fn_prefix, count, self.fn_prefix, idx);
        }

        format!("{}{}", self.fn_prefix, idx)
    }

    pub fn find_insertion_point(&self, source: &str) -> Option<InsertionPoint> {
        match self.strategy {
            InsertionStrategy::Literal => source.rfind(CLOSING).map(|idx| InsertionPoint {
                head_end: idx + 1,
                tail_start: idx + CLOSING.len() - 1,
            }),
            InsertionStrategy::Structural => container_close(source).map(|close| InsertionPoint {
                head_end: source[..close].trim_end().len(),
                tail_start: close,
            }),
        }
    }

    /// Add a test function wrapping `block` right before the end of the test
    /// contract.
    pub fn splice(&self, source: &str, block: &StatementBlock) -> Result<Spliced> {
        let point = self
            .find_insertion_point(source)
            .ok_or_else(|| anyhow!("insertion point not found ({:?} strategy)", self.strategy))?;
        let fn_name = self.next_test_name(source);
        debug!("insert {} at {:?}", fn_name, point);

        let mut body = block.as_str().to_string();
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        let function = self.handlebars.render(
            "test_fn",
            &TemplateArgs {
                fn_name: &fn_name,
                body: &body,
            },
        )?;

        let mut spliced = String::with_capacity(source.len() + function.len() + 2);
        spliced.push_str(&source[..point.head_end]);
        spliced.push_str("\n\n");
        spliced.push_str(&function);
        spliced.push_str(&source[point.tail_start..]);

        Ok(Spliced {
            source: spliced,
            fn_name,
        })
    }

    /// Splice into the file at `path`, overwriting it. Returns the new
    /// function name. The file is left untouched if no insertion point exists.
    pub fn splice_file(&self, path: impl AsRef<Path>, block: &StatementBlock) -> Result<String> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).with_context(|| format!("failed to read test file {}", path.display()))?;

        let spliced = self.splice(&source, block)?;
        debug!("spliced test file:\n{}", spliced.source);

        fs::write(path, &spliced.source).with_context(|| format!("failed to write test file {}", path.display()))?;
        info!("Added {}() to {}", spliced.fn_name, path.display());

        Ok(spliced.fn_name)
    }
}

/// Occurrences of `function` anywhere in the source, including comments,
/// strings and longer words such as `functions`.
pub fn count_fn_keywords(source: &str) -> usize {
    source.matches("function").count()
}

pub fn declared_fn_names(source: &str) -> Vec<&str> {
    FN_DECL
        .captures_iter(source)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

// Index of the `}` that brings the brace depth back to zero for the last time.
fn container_close(source: &str) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut close = None;

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = source[i..].find('\n').map_or(bytes.len(), |n| i + n);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = source[i + 2..].find("*/").map_or(bytes.len(), |n| i + 2 + n + 2);
                continue;
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    close = Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    if depth == 0 {
        close
    } else {
        None
    }
}
