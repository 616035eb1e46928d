//! Channel requirement stabilizer
//!
//! Channel counts flow bottom-up: container → group → master. Resolving a
//! container can remove tracks, which lowers requirements, which can in turn
//! change what other containers see, so the pass repeats until the hierarchy
//! snapshot stops changing.
//!
//! Per iteration:
//! 1. Re-resolve every container and detect downgrades
//! 2. Drop child tracks beyond each container's structure, and re-tag
//!    containers that shared a downgraded container's previous layout
//! 3. Compute requirements: container, group = max(containers, 2),
//!    master = max(groups, 2)
//! 4. Write channel counts to the host and compare snapshots

use std::collections::BTreeSet;

use rf_core::{TrackId, even_channel_count};
use serde::{Deserialize, Serialize};

use crate::ScatterResult;
use crate::channel::TrackStructure;
use crate::host::MediaHost;
use crate::project::{ContainerNode, Project, resolve_container};
use crate::warning::ScatterWarning;

// ═══════════════════════════════════════════════════════════════════════════════
// REQUIREMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Channels a track needs: what its content uses and what the host gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRequirement {
    pub logical: u32,
    /// Always even, at least 2
    pub physical: u32,
}

impl ChannelRequirement {
    pub fn from_logical(logical: u32) -> Self {
        Self {
            logical: logical.max(1),
            physical: even_channel_count(logical),
        }
    }

    /// Requirement covering both
    pub fn max(self, other: Self) -> Self {
        Self::from_logical(self.logical.max(other.logical))
    }
}

impl Default for ChannelRequirement {
    fn default() -> Self {
        Self::from_logical(2)
    }
}

/// Requirements for a whole project
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequirementReport {
    /// Indexed `[group][container]`
    pub containers: Vec<Vec<ChannelRequirement>>,
    pub groups: Vec<ChannelRequirement>,
    pub master: ChannelRequirement,
}

fn container_requirement(node: &ContainerNode, structure: &TrackStructure) -> ChannelRequirement {
    let logical = if node.provisioned {
        structure.required_channels_for(node.tracks.real_track_count())
    } else {
        structure.required_channels()
    };
    ChannelRequirement::from_logical(logical)
}

/// Requirements from the structures last resolved on each container.
/// Containers never resolved count as stereo.
pub fn compute_requirements(project: &Project) -> RequirementReport {
    let mut report = RequirementReport::default();
    let mut master = ChannelRequirement::default();

    for group in &project.groups {
        let containers: Vec<ChannelRequirement> = group
            .containers
            .iter()
            .map(|node| match &node.structure {
                Some(structure) => container_requirement(node, structure),
                None => ChannelRequirement::default(),
            })
            .collect();
        let group_requirement = containers
            .iter()
            .fold(ChannelRequirement::default(), |acc, r| acc.max(*r));
        master = master.max(group_requirement);
        report.groups.push(group_requirement);
        report.containers.push(containers);
    }
    report.master = master;
    report
}

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Channel counts and child counts across the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HierarchySnapshot {
    pub master: u32,
    pub groups: Vec<u32>,
    /// Container track channel counts, `[group][container]`
    pub containers: Vec<Vec<u32>>,
    /// Child track counts, `[group][container]`
    pub children: Vec<Vec<usize>>,
}

impl HierarchySnapshot {
    pub fn capture<H: MediaHost + ?Sized>(project: &Project, host: &H) -> Self {
        Self {
            master: host.channel_count(project.master),
            groups: project.groups.iter().map(|g| host.channel_count(g.track)).collect(),
            containers: project
                .groups
                .iter()
                .map(|g| {
                    g.containers
                        .iter()
                        .map(|c| host.channel_count(c.tracks.folder))
                        .collect()
                })
                .collect(),
            children: project
                .groups
                .iter()
                .map(|g| g.containers.iter().map(|c| c.tracks.children.len()).collect())
                .collect(),
        }
    }
}

/// Outcome of [`stabilize`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizationResult {
    pub converged: bool,
    pub iterations: usize,
    pub final_state: HierarchySnapshot,
    /// Containers whose width decreased, across all iterations
    pub downgrades: usize,
    /// Containers re-tagged because they shared a downgraded layout
    pub propagated: usize,
    pub warning: Option<ScatterWarning>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABILIZE
// ═══════════════════════════════════════════════════════════════════════════════

/// Iterate requirements to a fixed point. Non-convergence is reported as a
/// warning; the last state stays on the host.
pub fn stabilize<H: MediaHost + ?Sized>(
    project: &mut Project,
    host: &mut H,
    max_iterations: usize,
) -> ScatterResult<StabilizationResult> {
    let mut downgrades = 0;
    let mut propagated = 0;
    let mut iterations = 0;
    let mut converged = false;

    for iteration in 1..=max_iterations.max(1) {
        iterations = iteration;
        let before = HierarchySnapshot::capture(project, host);

        let outcome = resolve_and_downgrade(project, host)?;
        downgrades += outcome.downgraded;
        propagated += outcome.propagated;
        let requirements = compute_requirements(project);
        write_requirements(project, host, &requirements);

        let after = HierarchySnapshot::capture(project, host);
        log::debug!(
            "Stabilization pass {}: master {} ch, groups {:?}",
            iteration,
            after.master,
            after.groups
        );
        if before == after {
            converged = true;
            break;
        }
    }

    let warning = (!converged).then(|| {
        let warning = ScatterWarning::StabilizationNotConverged { iterations };
        log::warn!("{}", warning);
        warning
    });

    Ok(StabilizationResult {
        converged,
        iterations,
        final_state: HierarchySnapshot::capture(project, host),
        downgrades,
        propagated,
        warning,
    })
}

/// Containers touched by one resolve pass
#[derive(Debug, Clone, Copy, Default)]
struct PassOutcome {
    downgraded: usize,
    propagated: usize,
}

/// Re-resolve every container and drop child tracks beyond each structure.
/// Width decreases count as downgrades; containers sharing a downgraded
/// container's previous layout are re-tagged with it.
fn resolve_and_downgrade<H: MediaHost + ?Sized>(project: &mut Project, host: &mut H) -> ScatterResult<PassOutcome> {
    let mut downgraded = Vec::new();
    for (g, group) in project.groups.iter_mut().enumerate() {
        for (c, node) in group.containers.iter_mut().enumerate() {
            let Some(structure) = resolve_container(&project.config, g, c) else {
                continue;
            };
            let theoretical = ChannelRequirement::from_logical(structure.required_channels());
            let current = host.channel_count(node.tracks.folder);
            if node.structure.is_some() && theoretical.physical < current {
                log::debug!(
                    "Container {}/{} downgrades from {} to {} channels",
                    g,
                    c,
                    current,
                    theoretical.physical
                );
                downgraded.push((g, c, node.state.topology_tag));
            }
            node.structure = Some(structure);
        }
    }

    let mut propagated: BTreeSet<(usize, usize)> = BTreeSet::new();
    for &(dg, dc, prior) in &downgraded {
        let Some(prior) = prior else { continue };
        for (g, c) in project.container_indices() {
            let shares_layout = project.groups[g].containers[c].state.topology_tag == Some(prior);
            let downgraded_itself = downgraded.iter().any(|&(og, oc, _)| (og, oc) == (g, c));
            if shares_layout && !downgraded_itself {
                log::debug!("Container {}/{} follows downgrade of {}/{}", g, c, dg, dc);
                propagated.insert((g, c));
            }
        }
    }

    for group in &mut project.groups {
        for node in &mut group.containers {
            let keep = match &node.structure {
                Some(structure) if structure.num_tracks > 1 => structure.num_tracks,
                _ => 0,
            };
            drop_surplus_children(host, &mut node.tracks.children, keep)?;
            node.state.topology_tag = node.structure.as_ref().map(TrackStructure::tag);
        }
    }

    Ok(PassOutcome {
        downgraded: downgraded.len(),
        propagated: propagated.len(),
    })
}

fn drop_surplus_children<H: MediaHost + ?Sized>(
    host: &mut H,
    children: &mut Vec<TrackId>,
    keep: usize,
) -> ScatterResult<()> {
    while children.len() > keep {
        if let Some(child) = children.pop() {
            host.delete_track(child)?;
        }
    }
    Ok(())
}

fn write_requirements<H: MediaHost + ?Sized>(project: &Project, host: &mut H, requirements: &RequirementReport) {
    for (group, group_requirements) in project.groups.iter().zip(&requirements.containers) {
        for (node, requirement) in group.containers.iter().zip(group_requirements) {
            host.set_channel_count(node.tracks.folder, requirement.physical);
            if let Some(structure) = &node.structure {
                let width = even_channel_count(structure.track_channels);
                for &child in &node.tracks.children {
                    host.set_channel_count(child, width);
                }
            }
        }
    }
    for (group, requirement) in project.groups.iter().zip(&requirements.groups) {
        host.set_channel_count(group.track, requirement.physical);
    }
    host.set_channel_count(project.master, requirements.master.physical);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_STABILIZATION_ITERATIONS;
    use crate::apply::provision_tracks;
    use crate::channel::OutputFormat;
    use crate::config::{ChannelSettings, ContainerConfig, GroupConfig, ProjectConfig};
    use crate::host::MemoryHost;
    use crate::source::SourceItem;
    use rf_core::TimeRange;

    fn project_config(format: OutputFormat, channels: u32) -> ProjectConfig {
        ProjectConfig::new(TimeRange::new(0.0, 10.0).unwrap())
            .with_group(
                GroupConfig::new("Ambience")
                    .with_container(
                        ContainerConfig::new("Beds")
                            .with_item(SourceItem::new("bed.wav", channels, 4.0))
                            .with_channels(ChannelSettings::new(format)),
                    )
                    .with_container(ContainerConfig::new("Birds").with_item(SourceItem::new("bird.wav", 1, 1.0))),
            )
            .with_group(
                GroupConfig::new("Foley")
                    .with_container(ContainerConfig::new("Steps").with_item(SourceItem::new("step.wav", 2, 0.5))),
            )
    }

    #[test]
    fn test_requirement_is_even() {
        assert_eq!(ChannelRequirement::from_logical(1).physical, 2);
        assert_eq!(ChannelRequirement::from_logical(5).physical, 6);
        assert_eq!(ChannelRequirement::from_logical(6).physical, 6);
        assert_eq!(ChannelRequirement::from_logical(0).logical, 1);
    }

    #[test]
    fn test_hierarchy_invariant() {
        let mut host = MemoryHost::new();
        let mut project = Project::build(project_config(OutputFormat::Surround50, 5), &mut host).unwrap();
        let result = stabilize(&mut project, &mut host, MAX_STABILIZATION_ITERATIONS).unwrap();

        assert!(result.converged);
        assert!(result.warning.is_none());
        let state = &result.final_state;
        assert_eq!(state.containers[0][0], 6);
        assert_eq!(state.groups[0], 6);
        assert_eq!(state.groups[1], 2);
        assert_eq!(state.master, 6);
        for (g, containers) in state.containers.iter().enumerate() {
            assert!(state.master >= state.groups[g]);
            for &c in containers {
                assert!(state.groups[g] >= c);
                assert_eq!(c % 2, 0);
            }
        }
    }

    #[test]
    fn test_second_pass_is_stable() {
        let mut host = MemoryHost::new();
        let mut project = Project::build(project_config(OutputFormat::Quad, 4), &mut host).unwrap();
        let first = stabilize(&mut project, &mut host, MAX_STABILIZATION_ITERATIONS).unwrap();
        let second = stabilize(&mut project, &mut host, MAX_STABILIZATION_ITERATIONS).unwrap();
        assert_eq!(first.final_state, second.final_state);
        assert_eq!(second.iterations, 1);
        assert_eq!(second.downgrades, 0);
    }

    #[test]
    fn test_downgrade_removes_surplus_children() {
        let mut host = MemoryHost::new();
        let mut project = Project::build(project_config(OutputFormat::Quad, 2), &mut host).unwrap();

        // Stereo pool on quad: two L+R / LS+RS tracks
        let structure = resolve_container(&project.config, 0, 0).unwrap();
        let node = &mut project.groups[0].containers[0];
        provision_tracks(&mut host, &mut node.tracks, &structure, "Beds").unwrap();
        node.provisioned = true;
        stabilize(&mut project, &mut host, MAX_STABILIZATION_ITERATIONS).unwrap();
        assert_eq!(host.channel_count(project.groups[0].containers[0].tracks.folder), 4);

        // Switch the container to stereo output without regenerating
        project.config.groups[0].containers[0].channels = ChannelSettings::new(OutputFormat::Stereo);
        let result = stabilize(&mut project, &mut host, MAX_STABILIZATION_ITERATIONS).unwrap();

        assert!(result.converged);
        assert_eq!(result.downgrades, 1);
        let node = &project.groups[0].containers[0];
        assert!(node.tracks.children.is_empty());
        assert_eq!(host.channel_count(node.tracks.folder), 2);
        assert_eq!(result.final_state.master, 2);
    }

    fn provision(project: &mut Project, host: &mut MemoryHost, g: usize, c: usize) {
        let structure = resolve_container(&project.config, g, c).unwrap();
        let name = project.config.groups[g].containers[c].name.clone();
        let node = &mut project.groups[g].containers[c];
        provision_tracks(host, &mut node.tracks, &structure, &name).unwrap();
        node.provisioned = true;
    }

    #[test]
    fn test_single_track_layout_drops_children_without_downgrade() {
        let mut host = MemoryHost::new();
        let mut project = Project::build(project_config(OutputFormat::Quad, 2), &mut host).unwrap();
        provision(&mut project, &mut host, 0, 0);
        stabilize(&mut project, &mut host, MAX_STABILIZATION_ITERATIONS).unwrap();
        assert_eq!(project.groups[0].containers[0].tracks.children.len(), 2);

        // Quad pool on quad: one passthrough track at the same width
        project.config.groups[0].containers[0].items = vec![SourceItem::new("bed.wav", 4, 4.0)];
        let result = stabilize(&mut project, &mut host, 1).unwrap();

        assert_eq!(result.downgrades, 0);
        assert!(project.groups[0].containers[0].tracks.children.is_empty());
        assert_eq!(result.final_state.master, 4);
        assert_eq!(host.channel_count(project.groups[0].containers[0].tracks.folder), 4);
    }

    #[test]
    fn test_downgrade_propagates_to_shared_layout() {
        let quad_stereo = |name: &str| {
            ContainerConfig::new(name)
                .with_item(SourceItem::new("pair.wav", 2, 1.0))
                .with_channels(ChannelSettings::new(OutputFormat::Quad))
        };
        let config = ProjectConfig::new(TimeRange::new(0.0, 10.0).unwrap()).with_group(
            GroupConfig::new("Ambience")
                .with_container(quad_stereo("Left"))
                .with_container(quad_stereo("Right")),
        );
        let mut host = MemoryHost::new();
        let mut project = Project::build(config, &mut host).unwrap();
        provision(&mut project, &mut host, 0, 0);
        provision(&mut project, &mut host, 0, 1);
        stabilize(&mut project, &mut host, MAX_STABILIZATION_ITERATIONS).unwrap();
        let containers = &project.groups[0].containers;
        assert_eq!(containers[0].state.topology_tag, containers[1].state.topology_tag);

        // First narrows to stereo, second moves to a single quad track
        project.config.groups[0].containers[0].channels = ChannelSettings::new(OutputFormat::Stereo);
        project.config.groups[0].containers[1].items = vec![SourceItem::new("quad.wav", 4, 1.0)];
        let result = stabilize(&mut project, &mut host, MAX_STABILIZATION_ITERATIONS).unwrap();

        assert!(result.converged);
        assert_eq!(result.downgrades, 1);
        assert_eq!(result.propagated, 1);
        let containers = &project.groups[0].containers;
        assert!(containers[0].tracks.children.is_empty());
        assert!(containers[1].tracks.children.is_empty());
        assert_eq!(host.channel_count(containers[0].tracks.folder), 2);
        assert_eq!(host.channel_count(containers[1].tracks.folder), 4);
        assert_eq!(result.final_state.master, 4);
    }

    #[test]
    fn test_cap_reports_not_converged() {
        let mut host = MemoryHost::new();
        let mut project = Project::build(project_config(OutputFormat::Surround50, 5), &mut host).unwrap();
        // One pass changes the host, so it cannot also confirm the fixed point
        let result = stabilize(&mut project, &mut host, 1).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(
            result.warning,
            Some(ScatterWarning::StabilizationNotConverged { iterations: 1 })
        );
    }
}
