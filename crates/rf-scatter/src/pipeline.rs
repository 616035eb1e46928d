//! Generation pipeline
//!
//! resolve → place → clear → provision → apply for every container, then
//! folder layout and stabilization for the whole project. A failing container
//! is reported and skipped; its siblings still generate.

use rf_core::RfError;
use serde::{Deserialize, Serialize};

use crate::apply::{PlacedGrain, apply_plan, clear_range, provision_tracks};
use crate::channel::{ItemsAnalysis, TopologyStrategy, resolve};
use crate::config::EffectiveConfig;
use crate::host::MediaHost;
use crate::oracle::Oracles;
use crate::placement::{GenerationContext, PlacementInputs, container_seed, plan};
use crate::project::{Project, layout_folders};
use crate::stabilize::{StabilizationResult, stabilize};
use crate::warning::ScatterWarning;
use crate::{MAX_STABILIZATION_ITERATIONS, ScatterResult};

/// Outcome of one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerReport {
    pub group: usize,
    pub container: usize,
    pub name: String,
    pub strategy: Option<TopologyStrategy>,
    pub num_tracks: usize,
    pub grains: Vec<PlacedGrain>,
    /// Grains removed from the range before placing
    pub cleared: usize,
    pub warnings: Vec<ScatterWarning>,
    /// Set when the container failed
    pub error: Option<String>,
}

impl ContainerReport {
    fn failed(group: usize, container: usize, name: &str, error: String) -> Self {
        Self {
            group,
            container,
            name: name.to_string(),
            strategy: None,
            num_tracks: 0,
            grains: Vec::new(),
            cleared: 0,
            warnings: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a whole project pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub containers: Vec<ContainerReport>,
    pub stabilization: StabilizationResult,
}

impl GenerationReport {
    pub fn total_grains(&self) -> usize {
        self.containers.iter().map(|c| c.grains.len()).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ContainerReport> {
        self.containers.iter().filter(|c| !c.is_ok())
    }

    pub fn container(&self, name: &str) -> Option<&ContainerReport> {
        self.containers.iter().find(|c| c.name == name)
    }
}

/// Generate one container. Placement is decided before the host is touched,
/// so invalid settings leave existing grains in place.
pub fn generate_container<H: MediaHost + ?Sized>(
    project: &mut Project,
    host: &mut H,
    group: usize,
    container: usize,
    oracles: Oracles<'_>,
) -> ScatterResult<ContainerReport> {
    let (group_config, container_config) = project
        .container_config(group, container)
        .ok_or_else(|| RfError::InvalidParam(format!("no container {}/{}", group, container)))?;
    let effective = EffectiveConfig::resolve(group_config, container_config);
    let name = container_config.name.clone();
    let items = container_config.items.clone();
    let range = project.config.range;
    let seed = container_seed(project.config.seed, group, container);

    let structure = resolve(&effective.channels, &ItemsAnalysis::analyze(&items));
    log::debug!(
        "Container '{}': {} → {} tracks",
        name,
        structure.strategy.name(),
        structure.num_tracks
    );

    let node = project
        .groups
        .get_mut(group)
        .and_then(|g| g.containers.get_mut(container))
        .ok_or_else(|| RfError::State(format!("container {}/{} not built", group, container)))?;

    let mut ctx = GenerationContext::new(seed, &node.state);
    if let Some(warning) = structure.warning.clone() {
        ctx.warn(warning);
    }
    let inputs = PlacementInputs {
        range,
        tempo: &project.config.tempo,
        oracles,
    };
    let placement = plan(&effective, &structure, &items, &inputs, &mut ctx)?;

    // Cleared under the previous layout, before children change
    let cleared = clear_range(host, &node.tracks, range);
    provision_tracks(host, &mut node.tracks, &structure, &name)?;
    node.provisioned = true;
    let grains = apply_plan(
        host,
        &placement,
        &node.tracks,
        &items,
        &name,
        effective.placement.fades.crossfade.shape,
    )?;

    ctx.store(&mut node.state);
    let report = ContainerReport {
        group,
        container,
        name,
        strategy: Some(structure.strategy),
        num_tracks: structure.num_tracks,
        grains,
        cleared,
        warnings: ctx.warnings,
        error: None,
    };
    node.structure = Some(structure);
    Ok(report)
}

/// Generate every container, lay out folders and stabilize channel counts
pub fn generate_project<H: MediaHost + ?Sized>(
    project: &mut Project,
    host: &mut H,
    oracles: Oracles<'_>,
) -> ScatterResult<GenerationReport> {
    let mut containers = Vec::with_capacity(project.container_count());

    for (g, c) in project.container_indices() {
        match generate_container(project, host, g, c, oracles) {
            Ok(report) => containers.push(report),
            Err(e) => {
                let name = project
                    .container_config(g, c)
                    .map(|(_, config)| config.name.clone())
                    .unwrap_or_default();
                log::warn!("Container '{}' failed: {}", name, e);
                containers.push(ContainerReport::failed(g, c, &name, e.to_string()));
            }
        }
    }

    layout_folders(project, host);
    let stabilization = stabilize(project, host, MAX_STABILIZATION_ITERATIONS)?;

    let report = GenerationReport {
        containers,
        stabilization,
    };
    log::info!(
        "Generated {} grains in {} containers ({} failed), master {} channels",
        report.total_grains(),
        report.containers.len(),
        report.failed().count(),
        report.stabilization.final_state.master
    );
    Ok(report)
}
