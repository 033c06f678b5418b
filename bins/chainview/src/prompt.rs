use std::io::{BufRead, Write};

use anyhow::{Context, bail};
use chain_config::ChainConfig;

/// Asks until the answer names one of the configured symbols. Matching is
/// case-insensitive.
pub fn choose_symbol<R: BufRead, W: Write>(
    config: &ChainConfig,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<String> {
    let question = format!("Symbol [{}]: ", config.supported_symbols.join(", "));
    ask(input, out, &question, |answer| {
        config.match_symbol(answer).map(str::to_owned)
    })
}

pub fn choose_expiry<R: BufRead, W: Write>(
    config: &ChainConfig,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<String> {
    let question = format!(
        "Expiry (YYYYMMDD) [{}]: ",
        config.supported_expiries.join(", ")
    );
    ask(input, out, &question, |answer| {
        config.match_expiry(answer).map(str::to_owned)
    })
}

fn ask<R, W, F>(input: &mut R, out: &mut W, question: &str, accept: F) -> anyhow::Result<String>
where
    R: BufRead,
    W: Write,
    F: Fn(&str) -> Option<String>,
{
    let mut line = String::new();
    loop {
        write!(out, "{question}")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line).context("cannot read answer")? == 0 {
            bail!("input closed before a valid answer");
        }
        if let Some(choice) = accept(&line) {
            return Ok(choice);
        }
        writeln!(out, "'{}' is not supported", line.trim())?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn symbol_is_case_insensitive() {
        let config = ChainConfig::default();
        let mut input = Cursor::new("es\n");
        let mut out = Vec::new();
        assert_eq!(choose_symbol(&config, &mut input, &mut out).unwrap(), "ES");
    }

    #[test]
    fn asks_again_after_unsupported_answer() {
        let config = ChainConfig::default();
        let mut input = Cursor::new("20230101\n20250321\n");
        let mut out = Vec::new();
        assert_eq!(
            choose_expiry(&config, &mut input, &mut out).unwrap(),
            "20250321"
        );
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("'20230101' is not supported"));
        assert_eq!(shown.matches("Expiry").count(), 2);
    }

    #[test]
    fn closed_input_is_an_error() {
        let config = ChainConfig::default();
        let mut input = Cursor::new("CL\n");
        let mut out = Vec::new();
        assert!(choose_symbol(&config, &mut input, &mut out).is_err());
    }
}
