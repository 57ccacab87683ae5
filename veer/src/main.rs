/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::process::ExitCode;

use anyhow::{Context, anyhow};

fn main() -> anyhow::Result<ExitCode> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install the default rustls crypto provider"))?;

    let proc_args = veer::opts::parse_args()?;
    let _log_guard =
        veer::logger::setup(proc_args.verbose_level).context("failed to setup logger")?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    rt.block_on(veer::cmd::run(proc_args))
}
