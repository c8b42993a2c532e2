// This file is part of canton-scan.
// Copyright (C) 2025 Canton Scan contributors
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Context;
use clap::Parser;
use figment::{
    Figment,
    providers::{Format, Yaml},
};
use log::{error, info};
use scan_cli::{
    cli::{self, Args, Command},
    config::Config,
};
use scan_common::{
    config::ConfigExt,
    infra::{migrations, pool::postgres::PostgresPool},
    telemetry,
};
use scan_data::{
    application::ScanData,
    infra::{
        self, functions::FunctionsClient, scan_api::ReqwestScanApi,
        storage::postgres::PostgresStorage,
    },
};
use std::{io, panic};

#[tokio::main]
async fn main() {
    telemetry::init_logging();
    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    if let Err(error) = run().await {
        let backtrace = error.backtrace();
        let error = format!("{error:#}");
        error!(error, backtrace:%; "process exited with ERROR");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let Args { config, command } = Args::parse();

    let config = match config {
        Some(path) => Config::load_from(Figment::new().merge(Yaml::file(path))),
        None => Config::load(),
    }
    .context("load configuration")?;
    info!(config:?; "starting");

    let Config {
        run_migrations,
        application_config,
        infra_config,
        telemetry_config: telemetry::Config { metrics_config },
    } = config;

    telemetry::init_metrics(metrics_config).context("initialize metrics")?;

    let infra::Config {
        storage_config,
        scan_api_config,
        functions_config,
    } = infra_config;

    let pool = PostgresPool::new(storage_config)
        .await
        .context("create DB pool for Postgres")?;

    if run_migrations || matches!(command, Command::Migrate) {
        migrations::postgres::run(&pool)
            .await
            .context("run Postgres migrations")?;
        info!("migrations applied");
    }

    let storage = PostgresStorage::new(pool);
    let scan_api = ReqwestScanApi::new(scan_api_config).context("create Scan API client")?;
    let functions =
        FunctionsClient::new(functions_config).context("create backend functions client")?;

    let data = ScanData::new(application_config, storage, scan_api, functions);
    cli::execute(command, data, io::stdout())
        .await
        .context("execute command")
}
