use std::process::ExitCode;

use color_eyre::eyre::{Context as _, Result};
use erp_query_config::{get_env, load_settings};
use erp_query_web::{
    app::{App, Shutdown},
    readiness::DatabaseHealthCheck,
    runtime::AxumRuntime,
};

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    loop {
        let env = get_env();
        let settings = load_settings(&env).wrap_err("cannot load settings")?;
        let health = DatabaseHealthCheck::new(&settings.database);

        match App::boot(&settings, &health, &AxumRuntime).wrap_err("could not boot query service")? {
            Shutdown::Restart => continue,
            shutdown => return Ok(shutdown.into()),
        }
    }
}
