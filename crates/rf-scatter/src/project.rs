//! Project hierarchy on the host
//!
//! Master → groups → containers → output tracks. [`Project`] pairs the
//! [`ProjectConfig`] with the host tracks built for it and the state each
//! container carries between generation passes.

use rf_core::{FOLDER_NONE, FOLDER_OPEN, TrackId, folder_close};

use crate::ScatterResult;
use crate::apply::ContainerTracks;
use crate::channel::{ItemsAnalysis, TrackStructure, resolve};
use crate::config::{ContainerConfig, EffectiveConfig, GroupConfig, ProjectConfig};
use crate::host::MediaHost;
use crate::placement::ContainerState;

/// Container on the host
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerNode {
    pub tracks: ContainerTracks,
    pub state: ContainerState,
    /// Structure of the last resolve, `None` before the first one
    pub structure: Option<TrackStructure>,
    /// Child tracks were provisioned by a generation pass
    pub provisioned: bool,
}

/// Group on the host
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    pub track: TrackId,
    pub containers: Vec<ContainerNode>,
}

/// A project built on a host
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub config: ProjectConfig,
    pub master: TrackId,
    pub groups: Vec<GroupNode>,
}

impl Project {
    /// Create group and container tracks for `config` and lay out folders
    pub fn build<H: MediaHost + ?Sized>(config: ProjectConfig, host: &mut H) -> ScatterResult<Self> {
        let master = host.master_track();
        let mut after = None;
        let mut groups = Vec::with_capacity(config.groups.len());

        for group in &config.groups {
            let track = host.create_track(&group.name, after)?;
            after = Some(track);

            let mut containers = Vec::with_capacity(group.containers.len());
            for container in &group.containers {
                let folder = host.create_track(&container.name, after)?;
                after = Some(folder);
                containers.push(ContainerNode {
                    tracks: ContainerTracks::new(folder),
                    state: ContainerState::default(),
                    structure: None,
                    provisioned: false,
                });
            }
            groups.push(GroupNode { track, containers });
        }

        let project = Self {
            config,
            master,
            groups,
        };
        layout_folders(&project, host);
        log::debug!(
            "Built project: {} groups, {} containers",
            project.groups.len(),
            project.container_count()
        );
        Ok(project)
    }

    pub fn container_count(&self) -> usize {
        self.groups.iter().map(|g| g.containers.len()).sum()
    }

    /// `(group, container)` indices in project order
    pub fn container_indices(&self) -> Vec<(usize, usize)> {
        self.groups
            .iter()
            .enumerate()
            .flat_map(|(g, group)| (0..group.containers.len()).map(move |c| (g, c)))
            .collect()
    }

    pub fn container_config(&self, group: usize, container: usize) -> Option<(&GroupConfig, &ContainerConfig)> {
        let group = self.config.groups.get(group)?;
        Some((group, group.containers.get(container)?))
    }

    pub fn container(&self, group: usize, container: usize) -> Option<&ContainerNode> {
        self.groups.get(group)?.containers.get(container)
    }

    pub fn effective_config(&self, group: usize, container: usize) -> Option<EffectiveConfig> {
        let (group, container) = self.container_config(group, container)?;
        Some(EffectiveConfig::resolve(group, container))
    }
}

/// Resolve a container's structure from its current items and settings
pub fn resolve_container(config: &ProjectConfig, group: usize, container: usize) -> Option<TrackStructure> {
    let container = config.groups.get(group)?.containers.get(container)?;
    let analysis = ItemsAnalysis::analyze(&container.items);
    Some(resolve(&container.channels, &analysis))
}

/// Write folder depths: groups open a folder around their containers,
/// containers with children open a folder around them, and the last track of
/// each folder closes every level that ends there.
pub fn layout_folders<H: MediaHost + ?Sized>(project: &Project, host: &mut H) {
    for group in &project.groups {
        let Some(last) = group.containers.len().checked_sub(1) else {
            host.set_folder_depth(group.track, FOLDER_NONE);
            continue;
        };
        host.set_folder_depth(group.track, FOLDER_OPEN);

        for (index, node) in group.containers.iter().enumerate() {
            let closes_group = u32::from(index == last);
            let children = &node.tracks.children;
            if children.is_empty() {
                let depth = if closes_group > 0 {
                    folder_close(1)
                } else {
                    FOLDER_NONE
                };
                host.set_folder_depth(node.tracks.folder, depth);
                continue;
            }

            host.set_folder_depth(node.tracks.folder, FOLDER_OPEN);
            let last_child = children.len() - 1;
            for (k, &child) in children.iter().enumerate() {
                let depth = if k == last_child {
                    folder_close(1 + closes_group)
                } else {
                    FOLDER_NONE
                };
                host.set_folder_depth(child, depth);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::provision_tracks;
    use crate::channel::OutputFormat;
    use crate::config::ChannelSettings;
    use crate::host::MemoryHost;
    use crate::source::SourceItem;
    use rf_core::TimeRange;

    fn config() -> ProjectConfig {
        ProjectConfig::new(TimeRange::new(0.0, 10.0).unwrap())
            .with_group(
                GroupConfig::new("Ambience")
                    .with_container(
                        ContainerConfig::new("Birds")
                            .with_item(SourceItem::new("bird.wav", 2, 1.0))
                            .with_channels(ChannelSettings::new(OutputFormat::Quad)),
                    )
                    .with_container(ContainerConfig::new("Wind").with_item(SourceItem::new("wind.wav", 2, 4.0))),
            )
            .with_group(GroupConfig::new("Empty"))
    }

    #[test]
    fn test_build_track_order() {
        let mut host = MemoryHost::new();
        let project = Project::build(config(), &mut host).unwrap();
        let names: Vec<&str> = host.tracks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Ambience", "Birds", "Wind", "Empty"]);
        assert_eq!(project.container_count(), 2);
        assert_eq!(project.container_indices(), vec![(0, 0), (0, 1)]);
    }

    #[test]
    fn test_folder_layout_with_children() {
        let mut host = MemoryHost::new();
        let mut project = Project::build(config(), &mut host).unwrap();
        let structure = resolve_container(&project.config, 0, 0).unwrap();
        let node = &mut project.groups[0].containers[0];
        provision_tracks(&mut host, &mut node.tracks, &structure, "Birds").unwrap();
        layout_folders(&project, &mut host);

        let group = project.groups[0].track;
        let birds = &project.groups[0].containers[0].tracks;
        let wind = project.groups[0].containers[1].tracks.folder;
        assert_eq!(host.folder_depth(group), FOLDER_OPEN);
        assert_eq!(host.folder_depth(birds.folder), FOLDER_OPEN);
        assert_eq!(host.folder_depth(birds.children[1]), -1);
        assert_eq!(host.folder_depth(wind), -1);

        assert_eq!(host.parent_of(birds.children[0]), Some(birds.folder));
        assert_eq!(host.parent_of(birds.folder), Some(group));
        assert_eq!(host.parent_of(wind), Some(group));
        assert_eq!(host.parent_of(project.groups[1].track), None);
    }

    #[test]
    fn test_last_child_closes_group() {
        let config = ProjectConfig::new(TimeRange::new(0.0, 10.0).unwrap()).with_group(
            GroupConfig::new("G").with_container(
                ContainerConfig::new("C")
                    .with_item(SourceItem::new("a.wav", 2, 1.0))
                    .with_channels(ChannelSettings::new(OutputFormat::Quad)),
            ),
        );
        let mut host = MemoryHost::new();
        let mut project = Project::build(config, &mut host).unwrap();
        let structure = resolve_container(&project.config, 0, 0).unwrap();
        provision_tracks(&mut host, &mut project.groups[0].containers[0].tracks, &structure, "C").unwrap();
        layout_folders(&project, &mut host);

        let last = *project.groups[0].containers[0].tracks.children.last().unwrap();
        assert_eq!(host.folder_depth(last), -2);
    }
}
