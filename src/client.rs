//! Interactive query shell over a single store.
//!
//! Query text accumulates across lines until a line ends with `;`. Lines that
//! start with `:` are shell commands and are only recognised between queries.

use std::io::{BufRead, Write};

use crate::{
    backend::{GraphBackend, QueryDialect, QueryParams, QueryValue},
    errors::MovieKgError,
    query::{QueryIntent, run_intent},
    report::render_table,
};

const HELP: &str = "\
Enter a query terminated by ';'. Parameters are referenced as $name, so
use ?name for SPARQL variables: every $name must be bound with :param.
  :param NAME=VALUE   bind a parameter (numbers, true/false, \"text\", <iri>)
  :params             list bound parameters
  :reset              drop all parameters and any unfinished query
  :intents            list the built-in comparison queries
  :run INTENT [ARG]   run a built-in query (ARG: director, genre or rating)
  :help               show this help
  :quit               leave the shell
";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShellAction {
    Continue,
    Quit,
}

pub struct QueryShell<'a> {
    backend: &'a dyn GraphBackend,
    params: QueryParams,
    buffer: String,
}

impl<'a> QueryShell<'a> {
    pub fn new(backend: &'a dyn GraphBackend) -> Self {
        Self {
            backend,
            params: QueryParams::new(),
            buffer: String::new(),
        }
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> Result<(), MovieKgError> {
        let language = match self.backend.dialect() {
            QueryDialect::Sparql => "SPARQL",
            QueryDialect::Pattern => "MATCH ... RETURN",
        };
        writeln!(
            out,
            "Connected to {} ({language}). Type :help for commands.",
            self.backend.name()
        )?;
        self.prompt(&mut out)?;
        for line in input.lines() {
            let line = line?;
            if self.handle_line(&line, &mut out)? == ShellAction::Quit {
                return Ok(());
            }
            self.prompt(&mut out)?;
        }
        if !self.buffer.trim().is_empty() {
            let query = std::mem::take(&mut self.buffer);
            self.execute(&query, &mut out)?;
        }
        writeln!(out)?;
        Ok(())
    }

    pub fn handle_line<W: Write>(
        &mut self,
        line: &str,
        out: &mut W,
    ) -> Result<ShellAction, MovieKgError> {
        let trimmed = line.trim();
        if self.buffer.is_empty() {
            if trimmed.is_empty() {
                return Ok(ShellAction::Continue);
            }
            if let Some(command) = trimmed.strip_prefix(':') {
                return self.command(command, out);
            }
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');
        if trimmed.ends_with(';') {
            let text = std::mem::take(&mut self.buffer);
            let text = text.trim_end().trim_end_matches(';').to_owned();
            self.execute(&text, out)?;
        }
        Ok(ShellAction::Continue)
    }

    fn command<W: Write>(
        &mut self,
        command: &str,
        out: &mut W,
    ) -> Result<ShellAction, MovieKgError> {
        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        match name {
            "quit" | "exit" | "q" => return Ok(ShellAction::Quit),
            "help" | "h" => write!(out, "{HELP}")?,
            "param" => match parse_param(rest) {
                Ok((key, value)) => {
                    writeln!(out, "${key} = {value}")?;
                    self.params.insert(key, value);
                }
                Err(err) => writeln!(out, "error: {err}")?,
            },
            "params" => {
                if self.params.is_empty() {
                    writeln!(out, "(no parameters)")?;
                }
                for (key, value) in &self.params {
                    writeln!(out, "${key} = {value}")?;
                }
            }
            "reset" => {
                self.params.clear();
                self.buffer.clear();
                writeln!(out, "parameters cleared")?;
            }
            "intents" => {
                for intent in QueryIntent::NAMES {
                    writeln!(out, "  {intent}")?;
                }
            }
            "run" => {
                let (intent, arg) = match rest.split_once(char::is_whitespace) {
                    Some((intent, arg)) => (intent, Some(arg.trim())),
                    None => (rest, None),
                };
                match QueryIntent::parse(intent, arg) {
                    Ok(intent) => {
                        writeln!(out, "-- {}", intent.description())?;
                        match run_intent(self.backend, &intent) {
                            Ok(rows) => write!(out, "{}", render_table(&rows))?,
                            Err(err) => writeln!(out, "error: {err}")?,
                        }
                    }
                    Err(err) => writeln!(out, "error: {err}")?,
                }
            }
            other => writeln!(out, "unknown command :{other}; try :help")?,
        }
        Ok(ShellAction::Continue)
    }

    fn execute<W: Write>(&mut self, query: &str, out: &mut W) -> Result<(), MovieKgError> {
        match self.backend.query(query, &self.params) {
            Ok(rows) => write!(out, "{}", render_table(&rows))?,
            Err(err) => writeln!(out, "error: {err}")?,
        }
        Ok(())
    }

    fn prompt<W: Write>(&self, out: &mut W) -> Result<(), MovieKgError> {
        let prompt = if self.buffer.is_empty() {
            "moviekg> "
        } else {
            "     ... "
        };
        write!(out, "{prompt}")?;
        out.flush()?;
        Ok(())
    }
}

/// Parses `name=value`; see [`parse_param_value`] for how values are typed.
pub fn parse_param(assignment: &str) -> Result<(String, QueryValue), MovieKgError> {
    let (name, value) = assignment.split_once('=').ok_or_else(|| {
        MovieKgError::invalid_input(format!("expected NAME=VALUE, got {assignment:?}"))
    })?;
    let name = name.trim().trim_start_matches('$');
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(MovieKgError::invalid_input(format!(
            "invalid parameter name {name:?}"
        )));
    }
    Ok((name.to_owned(), parse_param_value(value.trim())))
}

/// Integers, floats and booleans are typed; `"..."`/`'...'` are text; `<...>` is an IRI.
pub fn parse_param_value(text: &str) -> QueryValue {
    if let Ok(value) = text.parse::<i64>() {
        return QueryValue::Integer(value);
    }
    if let Ok(value) = text.parse::<f64>() {
        if value.is_finite() {
            return QueryValue::Float(value);
        }
    }
    match text {
        "true" => return QueryValue::Bool(true),
        "false" => return QueryValue::Bool(false),
        _ => {}
    }
    let quoted = |open: char, close: char| {
        text.strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
            .filter(|_| text.len() >= 2)
    };
    if let Some(iri) = quoted('<', '>') {
        return QueryValue::Iri(iri.to_owned());
    }
    if let Some(inner) = quoted('"', '"').or_else(|| quoted('\'', '\'')) {
        return QueryValue::Text(inner.to_owned());
    }
    QueryValue::Text(text.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_values_are_typed() {
        assert_eq!(parse_param_value("2010"), QueryValue::Integer(2010));
        assert_eq!(parse_param_value("8.5"), QueryValue::Float(8.5));
        assert_eq!(parse_param_value("true"), QueryValue::Bool(true));
        assert_eq!(
            parse_param_value("\"Christopher Nolan\""),
            QueryValue::text("Christopher Nolan")
        );
        assert_eq!(parse_param_value("Drama"), QueryValue::text("Drama"));
        assert_eq!(
            parse_param_value("<http://movie-kg.org/ontology#Movie>"),
            QueryValue::Iri("http://movie-kg.org/ontology#Movie".into())
        );
    }

    #[test]
    fn test_param_assignment_rejects_bad_names() {
        assert!(parse_param("no equals sign").is_err());
        assert!(parse_param("bad name=1").is_err());
        let (name, value) = parse_param("$genre=Sci-Fi").expect("assignment");
        assert_eq!(name, "genre");
        assert_eq!(value, QueryValue::text("Sci-Fi"));
    }
}
