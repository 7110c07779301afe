//! Command-line templates rendered against a per-request argument bag.
//!
//! Rendering and execution stay separate on purpose: a template renders
//! to a plain string with `{{ name }}` substitution, and only then is
//! that string tokenized into an argv. The quoting rules of the
//! tokenizer are part of how templates are authored, so the rendered
//! string is never handed to a shell.

use minijinja::Environment;

use crate::model::Arguments;

use super::tokenizer::tokenize;

/// A named `{{ name }}`-substitution template for one command line.
///
/// The name is diagnostic only; it shows up in render errors and logs.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    name: String,
    source: String,
}

impl CommandTemplate {
    /// Build a template, checking that the source parses.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, minijinja::Error> {
        let name = name.into();
        let source = source.into();
        {
            let mut env = Environment::new();
            env.add_template(&name, &source)?;
        }
        Ok(Self { name, source })
    }

    /// Build a template named after its first whitespace-delimited word.
    pub fn auto_named(source: impl Into<String>) -> Result<Self, minijinja::Error> {
        let source = source.into();
        let name = source
            .split_whitespace()
            .next()
            .unwrap_or("<noname>")
            .to_string();
        Self::new(name, source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the template into a concrete command line.
    pub fn render(&self, args: &Arguments) -> Result<String, minijinja::Error> {
        let env = Environment::new();
        env.render_named_str(&self.name, &self.source, args)
    }

    /// Render and tokenize into an argv. An empty argv means the
    /// template was invalid for the given arguments.
    pub fn render_argv(&self, args: &Arguments) -> Result<Vec<String>, minijinja::Error> {
        Ok(tokenize(&self.render(args)?))
    }
}
