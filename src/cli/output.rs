use std::io::{self, Write};

use anyhow::Result;

use crate::workflow::SearchReport;

/// One ranked match per line: score, then text.
pub(crate) fn format_plain(report: &SearchReport) -> String {
	let mut out = String::new();
	for found in &report.matches {
		out.push_str(&format!("{}\t{}\n", found.score, found.text));
	}
	out
}

pub(crate) fn print_plain(report: &SearchReport) -> Result<()> {
	let mut stdout = io::stdout().lock();
	stdout.write_all(format_plain(report).as_bytes())?;
	if !report.complete {
		eprintln!(
			"frz: timed out before generation {} was ranked",
			report.generation
		);
	}
	Ok(())
}

pub(crate) fn format_report_json(report: &SearchReport) -> Result<String> {
	Ok(serde_json::to_string_pretty(report)?)
}

pub(crate) fn print_json(report: &SearchReport) -> Result<()> {
	println!("{}", format_report_json(report)?);
	Ok(())
}
