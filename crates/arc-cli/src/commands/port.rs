//! PoE port commands. "all" selects every port the switch reports.

use futures::future::join_all;
use tracing::debug;

use arc_api::{PortPoe, Session};

use crate::cli::{GlobalOpts, PortArgs, PortCommand};
use crate::error::CliError;
use crate::output::{self, PoeRow};

use super::util;

fn is_all(ports: &[String]) -> bool {
    matches!(ports, [only] if only == "all")
}

/// PoE state of the selected ports. A single port is read directly.
async fn select(session: &Session, ports: &[String]) -> Result<Vec<PortPoe>, CliError> {
    if is_all(ports) {
        return Ok(session.get_ports().await?);
    }
    if let [single] = ports {
        return Ok(vec![session.get_port(single).await?]);
    }
    let all = session.get_ports().await?;
    Ok(all.into_iter().filter(|p| ports.contains(&p.port_id)).collect())
}

pub async fn handle(args: PortArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let name = util::active_profile_name(global, &cfg);
    let switch = util::switch_config(&cfg, &name, global)?;
    let session = util::connect(&switch).await?.session;

    let ports = match args.command {
        PortCommand::Get { ports } => select(&session, &ports).await?,

        PortCommand::Set { ports, data } => {
            let body: serde_json::Value = serde_json::from_str(&data)?;
            let targets = if is_all(&ports) {
                session.get_ports().await?.into_iter().map(|p| p.port_id).collect()
            } else {
                ports
            };
            debug!(ports = targets.len(), "writing poe settings");

            let writes = targets.iter().map(|port| session.set_port(port, &body));
            join_all(writes)
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let out = output::render_list(
        &global.output,
        &ports,
        |p: &PortPoe| PoeRow::from(p),
        |p| p.port_id.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
