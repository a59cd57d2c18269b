use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use super::formatter::FormattingSettings;
use crate::{ManError, ParseError};

/// # ManConfig
///
/// Parsed configuration file
///
/// ## Fields:
/// * `manpaths`
/// * `output_options`
#[derive(Debug, Default)]
pub struct ManConfig {
    pub manpaths: Vec<PathBuf>,
    pub output_options: HashMap<String, Option<String>>,
}

impl ManConfig {
    /// # apply_output_options
    ///
    /// Overrides formatting settings with the `output` directives.
    ///
    /// # Errors:
    /// * malformed number or switch
    pub fn apply_output_options(&self, settings: &mut FormattingSettings) -> Result<(), ManError> {
        for (name, value) in &self.output_options {
            let Some(value) = value else {
                log::debug!("output {name} has no value");
                continue;
            };

            match name.as_str() {
                "width" => settings.right_margin = parse_number(value)?,
                "lines" => settings.page_length = parse_number(value)?,
                "tab" => settings.standard_tab = parse_number(value)?,
                "verbose" => {
                    settings.verbose = match value.as_str() {
                        "yes" | "on" | "1" => true,
                        "no" | "off" | "0" => false,
                        _ => {
                            return Err(ManError::ParseError(ParseError::InvalidValue(
                                name.clone(),
                                value.clone(),
                            )))
                        }
                    }
                }
                _ => log::debug!("ignoring output option {name}"),
            }
        }
        Ok(())
    }
}

fn parse_number(value: &str) -> Result<usize, ManError> {
    value
        .parse::<usize>()
        .map_err(|err| ManError::ParseError(ParseError::ParseIntError(err)))
}

/// # parse_config_file
///
/// Parses man configuration file.
///
/// # Params:
/// * path - path to configuration file
///
/// # Errors:
/// * io
pub fn parse_config_file(path: &Path) -> Result<ManConfig, ManError> {
    let file = File::open(path)?;
    parse_config(BufReader::new(file))
}

/// Parses configuration directives from `reader`.
pub fn parse_config<R: BufRead>(reader: R) -> Result<ManConfig, ManError> {
    let mut conf = ManConfig::default();

    for line_result in reader.lines() {
        let line = line_result?;
        let line = line.trim();

        if line.is_empty() || line.starts_with("#") {
            continue;
        }

        let mut parts = line.split_whitespace();
        let directive = match parts.next() {
            Some(d) => d,
            None => continue,
        };

        match directive {
            "manpath" => {
                if let Some(path) = parts.next() {
                    conf.manpaths.push(PathBuf::from(path));
                }
            }
            "output" => {
                if let Some(option_name) = parts.next() {
                    let value = parts.next().map(|s| s.to_string());
                    conf.output_options.insert(option_name.to_string(), value);
                }
            }
            _ => log::debug!("ignoring configuration directive {directive}"),
        }
    }

    Ok(conf)
}
