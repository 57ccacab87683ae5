/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use bytes::Bytes;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint, value_parser};
use http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use veer_types::net::{Proxy, TlsVersion};

use crate::loader::DEFAULT_MAX_REDIRECTS;
use crate::probe::ProbeMode;
use crate::request::DEFAULT_TIMEOUT_INTERVAL;

const ARGS_VERBOSE: &str = "verbose";
const ARGS_URL: &str = "url";
const ARGS_PROXY: &str = "proxy";
const ARGS_METHOD: &str = "method";
const ARGS_HEADER: &str = "header";
const ARGS_DATA: &str = "data";
const ARGS_TIMEOUT: &str = "timeout";
const ARGS_TLS_MIN: &str = "tls-min";
const ARGS_PROBE: &str = "probe";
const ARGS_MAX_REDIRECTS: &str = "max-redirects";
const ARGS_OUTPUT: &str = "output";

pub struct ProcArgs {
    pub verbose_level: u8,
    pub url: Url,
    pub proxy: Option<Proxy>,
    pub method: String,
    pub headers: HeaderMap,
    pub data: Option<Bytes>,
    pub timeout: f64,
    pub tls_min: Option<TlsVersion>,
    /// probe the proxy before each attempt
    pub probe: Option<ProbeMode>,
    pub max_redirects: usize,
    pub output: Option<PathBuf>,
}

fn build_cli_args() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new(ARGS_VERBOSE)
                .help("Show verbose output")
                .num_args(0)
                .action(ArgAction::Count)
                .short('v')
                .long("verbose"),
        )
        .arg(
            Arg::new(ARGS_URL)
                .help("Target url")
                .num_args(1)
                .value_name("URL")
                .value_hint(ValueHint::Url)
                .value_parser(value_parser!(Url))
                .required(true),
        )
        .arg(
            Arg::new(ARGS_PROXY)
                .help("Route the request through this proxy, socks5:// or http://")
                .num_args(1)
                .value_name("PROXY URL")
                .value_hint(ValueHint::Url)
                .value_parser(value_parser!(Url))
                .short('x')
                .long("proxy"),
        )
        .arg(
            Arg::new(ARGS_METHOD)
                .help("Request method")
                .num_args(1)
                .value_name("METHOD")
                .default_value("GET")
                .short('X')
                .long("method"),
        )
        .arg(
            Arg::new(ARGS_HEADER)
                .help("Extra request header, as \"Name: value\"")
                .num_args(1)
                .value_name("HEADER")
                .action(ArgAction::Append)
                .short('H')
                .long("header"),
        )
        .arg(
            Arg::new(ARGS_DATA)
                .help("Request body")
                .num_args(1)
                .value_name("DATA")
                .short('d')
                .long("data"),
        )
        .arg(
            Arg::new(ARGS_TIMEOUT)
                .help("Request timeout in seconds")
                .num_args(1)
                .value_name("SECONDS")
                .value_parser(value_parser!(f64))
                .default_value("60")
                .long("timeout"),
        )
        .arg(
            Arg::new(ARGS_TLS_MIN)
                .help("Minimum tls protocol version")
                .num_args(1)
                .value_name("VERSION")
                .long("tls-min"),
        )
        .arg(
            Arg::new(ARGS_PROBE)
                .help("Probe the proxy by tcp connect before the request")
                .num_args(1)
                .value_name("MODE")
                .value_parser(["guarded", "budgeted"])
                .requires(ARGS_PROXY)
                .long("probe"),
        )
        .arg(
            Arg::new(ARGS_MAX_REDIRECTS)
                .help("Maximum number of redirects to follow")
                .num_args(1)
                .value_name("COUNT")
                .value_parser(value_parser!(usize))
                .default_value("10")
                .long("max-redirects"),
        )
        .arg(
            Arg::new(ARGS_OUTPUT)
                .help("Write the body to this file instead of stdout")
                .num_args(1)
                .value_name("FILE")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .short('o')
                .long("output"),
        )
}

fn parse_header(s: &str) -> anyhow::Result<(HeaderName, HeaderValue)> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| anyhow!("no ':' delimiter found"))?;
    let name = HeaderName::from_str(name.trim()).context("invalid header name")?;
    let value = HeaderValue::from_str(value.trim()).context("invalid header value")?;
    Ok((name, value))
}

fn parse_clap(args: &ArgMatches) -> anyhow::Result<ProcArgs> {
    let url = args
        .get_one::<Url>(ARGS_URL)
        .cloned()
        .ok_or_else(|| anyhow!("no target url set"))?;

    let proxy = match args.get_one::<Url>(ARGS_PROXY) {
        Some(u) => Some(Proxy::try_from(u).context(format!("invalid proxy url {u}"))?),
        None => None,
    };

    let mut headers = HeaderMap::new();
    if let Some(values) = args.get_many::<String>(ARGS_HEADER) {
        for s in values {
            let (name, value) = parse_header(s).context(format!("invalid header {s}"))?;
            headers.append(name, value);
        }
    }

    let tls_min = match args.get_one::<String>(ARGS_TLS_MIN) {
        Some(s) => Some(TlsVersion::from_str(s)?),
        None => None,
    };
    let probe = match args.get_one::<String>(ARGS_PROBE) {
        Some(s) => Some(ProbeMode::from_str(s)?),
        None => None,
    };

    Ok(ProcArgs {
        verbose_level: args.get_count(ARGS_VERBOSE),
        url,
        proxy,
        method: args
            .get_one::<String>(ARGS_METHOD)
            .cloned()
            .unwrap_or_else(|| "GET".to_string()),
        headers,
        data: args
            .get_one::<String>(ARGS_DATA)
            .map(|s| Bytes::from(s.clone())),
        timeout: args
            .get_one::<f64>(ARGS_TIMEOUT)
            .copied()
            .unwrap_or(DEFAULT_TIMEOUT_INTERVAL),
        tls_min,
        probe,
        max_redirects: args
            .get_one::<usize>(ARGS_MAX_REDIRECTS)
            .copied()
            .unwrap_or(DEFAULT_MAX_REDIRECTS),
        output: args.get_one::<PathBuf>(ARGS_OUTPUT).cloned(),
    })
}

pub fn parse_args() -> anyhow::Result<ProcArgs> {
    let args = build_cli_args().get_matches();
    parse_clap(&args)
}
