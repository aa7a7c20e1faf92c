//! `show`: normalized live configuration of one switch.

use tokio_util::sync::CancellationToken;

use arc_core::{ArubaSwitch, ConfigEntity, TracingSink, fetch_live};

use crate::cli::{GlobalOpts, ShowArgs};
use crate::error::CliError;
use crate::output::{self, EntityRow};

use super::util;

pub async fn handle(args: ShowArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let name = args
        .device
        .unwrap_or_else(|| util::active_profile_name(global, &cfg));
    let switch = util::switch_config(&cfg, &name, global)?;
    let retry = cfg.profile(&name)?.retry_policy(&cfg.defaults);

    let connected = util::connect(&switch).await?;
    let mut device = ArubaSwitch::new(&name, connected.session);
    let live = fetch_live(
        &mut device,
        &util::kinds(&args.kinds),
        &retry,
        &TracingSink,
        &CancellationToken::new(),
    )
    .await
    .map_err(|e| CliError::from(e).for_profile(&name))?;

    let entities: Vec<&ConfigEntity> = live.entities().collect();
    let out = output::render_list(
        &global.output,
        &entities,
        |e| EntityRow::from(*e),
        |e| e.key().to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
