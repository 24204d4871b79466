//! Logging drivers
//!
//! Every driver is its own variant with its own option table. Parsing a
//! driver from a definition document goes through [`OptionReader`], so an
//! option that belongs to a different driver is rejected rather than
//! silently carried along.

use super::common::parse_bool;
use super::config::LoggingSpec;
use super::options::{push_opt, require_field, OptionReader};
use crate::error::{Result, StackError};
use indexmap::IndexMap;

/// `json-file` and `local` options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileLogOptions {
    pub max_size: Option<String>,
    pub max_file: Option<String>,
    pub compress: Option<String>,
}

/// `syslog` options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyslogOptions {
    pub address: Option<String>,
    pub facility: Option<String>,
    pub tag: Option<String>,
    pub format: Option<String>,
}

/// `journald` options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournaldOptions {
    pub tag: Option<String>,
    pub labels: Option<String>,
}

/// `gelf` options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GelfOptions {
    pub address: String,
    pub tag: Option<String>,
    pub compression_type: Option<String>,
}

/// `fluentd` options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FluentdOptions {
    pub address: Option<String>,
    pub tag: Option<String>,
    pub async_connect: Option<String>,
}

/// `awslogs` options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwslogsOptions {
    pub region: String,
    pub group: String,
    pub stream: Option<String>,
    pub create_group: Option<String>,
}

/// `splunk` options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplunkOptions {
    pub token: String,
    pub url: String,
    pub source: Option<String>,
    pub index: Option<String>,
}

/// `gcplogs` options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcplogsOptions {
    pub project: Option<String>,
    pub log_cmd: Option<String>,
}

/// Logging driver with its options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Logging {
    JsonFile(FileLogOptions),
    Local(FileLogOptions),
    Syslog(SyslogOptions),
    Journald(JournaldOptions),
    Gelf(GelfOptions),
    Fluentd(FluentdOptions),
    Awslogs(AwslogsOptions),
    Splunk(SplunkOptions),
    Gcplogs(GcplogsOptions),
    None,
}

impl Logging {
    /// Driver name as the engine knows it
    pub fn driver(&self) -> &'static str {
        match self {
            Logging::JsonFile(_) => "json-file",
            Logging::Local(_) => "local",
            Logging::Syslog(_) => "syslog",
            Logging::Journald(_) => "journald",
            Logging::Gelf(_) => "gelf",
            Logging::Fluentd(_) => "fluentd",
            Logging::Awslogs(_) => "awslogs",
            Logging::Splunk(_) => "splunk",
            Logging::Gcplogs(_) => "gcplogs",
            Logging::None => "none",
        }
    }

    /// Parse a driver and its option map
    pub fn from_options(driver: &str, options: &IndexMap<String, String>) -> Result<Self> {
        let mut reader = OptionReader::new(format!("logging driver '{}'", driver), options);
        let logging = match driver {
            "json-file" => Logging::JsonFile(read_file_options(&mut reader)),
            "local" => Logging::Local(read_file_options(&mut reader)),
            "syslog" => Logging::Syslog(SyslogOptions {
                address: reader.optional("syslog-address"),
                facility: reader.optional("syslog-facility"),
                tag: reader.optional("tag"),
                format: reader.optional("syslog-format"),
            }),
            "journald" => Logging::Journald(JournaldOptions {
                tag: reader.optional("tag"),
                labels: reader.optional("labels"),
            }),
            "gelf" => Logging::Gelf(GelfOptions {
                address: reader.required("gelf-address")?,
                tag: reader.optional("tag"),
                compression_type: reader.optional("gelf-compression-type"),
            }),
            "fluentd" => Logging::Fluentd(FluentdOptions {
                address: reader.optional("fluentd-address"),
                tag: reader.optional("tag"),
                async_connect: reader.optional("fluentd-async"),
            }),
            "awslogs" => Logging::Awslogs(AwslogsOptions {
                region: reader.required("awslogs-region")?,
                group: reader.required("awslogs-group")?,
                stream: reader.optional("awslogs-stream"),
                create_group: reader.optional("awslogs-create-group"),
            }),
            "splunk" => Logging::Splunk(SplunkOptions {
                token: reader.required("splunk-token")?,
                url: reader.required("splunk-url")?,
                source: reader.optional("splunk-source"),
                index: reader.optional("splunk-index"),
            }),
            "gcplogs" => Logging::Gcplogs(GcplogsOptions {
                project: reader.optional("gcp-project"),
                log_cmd: reader.optional("gcp-log-cmd"),
            }),
            "none" => Logging::None,
            other => {
                return Err(StackError::shape(
                    "logging driver",
                    format!("unknown driver '{}'", other),
                ))
            }
        };
        reader.finish()?;
        logging.validate()?;
        Ok(logging)
    }

    pub fn from_spec(spec: &LoggingSpec) -> Result<Self> {
        Self::from_options(&spec.driver, &spec.options)
    }

    /// Check required options and value formats of this variant
    pub fn validate(&self) -> Result<()> {
        let context = format!("logging driver '{}'", self.driver());
        match self {
            Logging::JsonFile(opts) | Logging::Local(opts) => {
                if let Some(max_file) = &opts.max_file {
                    match max_file.parse::<u32>() {
                        Ok(n) if n >= 1 => {}
                        _ => {
                            return Err(StackError::range(
                                "max-file",
                                format!("'{}' must be a positive integer", max_file),
                            ))
                        }
                    }
                }
                if let Some(compress) = &opts.compress {
                    parse_bool("compress", compress)?;
                }
            }
            Logging::Gelf(opts) => require_field(&context, "gelf-address", &opts.address)?,
            Logging::Fluentd(opts) => {
                if let Some(value) = &opts.async_connect {
                    parse_bool("fluentd-async", value)?;
                }
            }
            Logging::Awslogs(opts) => {
                require_field(&context, "awslogs-region", &opts.region)?;
                require_field(&context, "awslogs-group", &opts.group)?;
                if let Some(value) = &opts.create_group {
                    parse_bool("awslogs-create-group", value)?;
                }
            }
            Logging::Splunk(opts) => {
                require_field(&context, "splunk-token", &opts.token)?;
                require_field(&context, "splunk-url", &opts.url)?;
            }
            Logging::Syslog(_) | Logging::Journald(_) | Logging::Gcplogs(_) | Logging::None => {}
        }
        Ok(())
    }

    /// Options that were set, in table order
    pub fn options(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        match self {
            Logging::JsonFile(opts) | Logging::Local(opts) => {
                push_opt(&mut out, "max-size", &opts.max_size);
                push_opt(&mut out, "max-file", &opts.max_file);
                push_opt(&mut out, "compress", &opts.compress);
            }
            Logging::Syslog(opts) => {
                push_opt(&mut out, "syslog-address", &opts.address);
                push_opt(&mut out, "syslog-facility", &opts.facility);
                push_opt(&mut out, "tag", &opts.tag);
                push_opt(&mut out, "syslog-format", &opts.format);
            }
            Logging::Journald(opts) => {
                push_opt(&mut out, "tag", &opts.tag);
                push_opt(&mut out, "labels", &opts.labels);
            }
            Logging::Gelf(opts) => {
                out.push(("gelf-address", opts.address.clone()));
                push_opt(&mut out, "tag", &opts.tag);
                push_opt(&mut out, "gelf-compression-type", &opts.compression_type);
            }
            Logging::Fluentd(opts) => {
                push_opt(&mut out, "fluentd-address", &opts.address);
                push_opt(&mut out, "tag", &opts.tag);
                push_opt(&mut out, "fluentd-async", &opts.async_connect);
            }
            Logging::Awslogs(opts) => {
                out.push(("awslogs-region", opts.region.clone()));
                out.push(("awslogs-group", opts.group.clone()));
                push_opt(&mut out, "awslogs-stream", &opts.stream);
                push_opt(&mut out, "awslogs-create-group", &opts.create_group);
            }
            Logging::Splunk(opts) => {
                out.push(("splunk-token", opts.token.clone()));
                out.push(("splunk-url", opts.url.clone()));
                push_opt(&mut out, "splunk-source", &opts.source);
                push_opt(&mut out, "splunk-index", &opts.index);
            }
            Logging::Gcplogs(opts) => {
                push_opt(&mut out, "gcp-project", &opts.project);
                push_opt(&mut out, "gcp-log-cmd", &opts.log_cmd);
            }
            Logging::None => {}
        }
        out
    }
}

fn read_file_options(reader: &mut OptionReader) -> FileLogOptions {
    FileLogOptions {
        max_size: reader.optional("max-size"),
        max_file: reader.optional("max-file"),
        compress: reader.optional("compress"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_json_file_options() {
        let logging =
            Logging::from_options("json-file", &opts(&[("max-size", "10m"), ("max-file", "3")]))
                .unwrap();
        assert_eq!(logging.driver(), "json-file");
        assert_eq!(
            logging.options(),
            vec![("max-size", "10m".to_string()), ("max-file", "3".to_string())]
        );
    }

    #[test]
    fn test_unknown_driver() {
        assert!(matches!(
            Logging::from_options("carrier-pigeon", &IndexMap::new()),
            Err(StackError::Shape { .. })
        ));
    }

    #[test]
    fn test_foreign_option_rejected() {
        let result = Logging::from_options(
            "gelf",
            &opts(&[("gelf-address", "udp://log:12201"), ("awslogs-region", "eu-west-1")]),
        );
        assert!(matches!(result, Err(StackError::Shape { .. })));
    }

    #[test]
    fn test_required_options() {
        assert!(matches!(
            Logging::from_options("awslogs", &opts(&[("awslogs-region", "eu-west-1")])),
            Err(StackError::MissingField { ref field, .. }) if field == "awslogs-group"
        ));

        let typed = Logging::Splunk(SplunkOptions {
            url: "https://splunk:8088".to_string(),
            ..Default::default()
        });
        assert!(matches!(typed.validate(), Err(StackError::MissingField { .. })));
    }

    #[test]
    fn test_value_checks() {
        assert!(matches!(
            Logging::from_options("local", &opts(&[("max-file", "0")])),
            Err(StackError::Range { .. })
        ));
        assert!(matches!(
            Logging::from_options("json-file", &opts(&[("compress", "maybe")])),
            Err(StackError::Shape { .. })
        ));
    }

    #[test]
    fn test_none_takes_no_options() {
        assert!(Logging::from_options("none", &IndexMap::new()).is_ok());
        assert!(Logging::from_options("none", &opts(&[("tag", "x")])).is_err());
    }
}
