use sha1::{Digest, Sha1};
use std::{
    ffi::{OsStr, OsString},
    io,
    path::{Path, PathBuf},
};

use crate::{gel::context_trace, FileAccess};

use super::{BuildContext, InstanceName};

/// The ordered list of project filenames supported, most preferred first.
pub const PROJECT_FILES: &[&str] = &["gel.toml", "edgedb.toml"];

/// Where to start looking for a project file, and whether to keep walking
/// up through parent directories when the starting directory has none.
pub enum ProjectDir {
    SearchCwd,
    Search(PathBuf),
    NoSearch(PathBuf),
}

impl ProjectDir {
    fn starting_path(self, context: &mut impl BuildContext) -> Option<(PathBuf, bool)> {
        match self {
            ProjectDir::SearchCwd => {
                let cwd = context.cwd();
                if cwd.is_none() {
                    context_trace!(context, "No current directory, skipping project search");
                }
                cwd.map(|p| (p.to_path_buf(), true))
            }
            ProjectDir::Search(path) => Some((path, true)),
            ProjectDir::NoSearch(path) => Some((path, false)),
        }
    }
}

#[derive(Debug)]
pub struct ProjectSearchResult {
    #[allow(unused)]
    pub project_path: PathBuf,
    pub project: Option<Project>,
}

/// Walks from `start_path` (and its parents, unless `NoSearch`) looking for
/// one of `PROJECT_FILES`, then loads the stashed project metadata that a
/// prior `gel project init` would have written for that directory.
pub fn find_project_file(
    context: &mut impl BuildContext,
    start_path: ProjectDir,
) -> io::Result<Option<ProjectSearchResult>> {
    let Some((dir, search_parents)) = start_path.starting_path(context) else {
        return Ok(None);
    };

    let Some(project_path) = locate_project_file(context, &dir, search_parents)? else {
        context_trace!(context, "No project file found");
        return Ok(None);
    };
    context_trace!(context, "Project path: {:?}", project_path);

    let project_dir = project_path.parent().unwrap_or(&project_path);
    let stash = stash_dir_for(context, project_dir);
    context_trace!(context, "Stash path: {:?}", stash);
    let project = Project::load(&stash, context);
    context_trace!(context, "Project: {:?}", project);

    Ok(Some(ProjectSearchResult {
        project_path,
        project,
    }))
}

/// Ascends from `base` one directory at a time, stopping at the first one
/// that contains any of `PROJECT_FILES`. If more than one project file is
/// present in the same directory, their contents must agree -- this is a
/// migration aid (`edgedb.toml` renamed to `gel.toml`), not a way to merge
/// two different manifests.
fn locate_project_file(
    context: &mut impl BuildContext,
    base: &Path,
    search_parents: bool,
) -> io::Result<Option<PathBuf>> {
    let mut dir = base.to_path_buf();
    loop {
        if let Some(found) = first_agreeing_candidate(context, &dir)? {
            return Ok(Some(found));
        }
        if !search_parents {
            return Ok(None);
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => return Ok(None),
        }
    }
}

fn first_agreeing_candidate(
    context: &mut impl BuildContext,
    dir: &Path,
) -> io::Result<Option<PathBuf>> {
    let mut candidates = Vec::new();
    for name in PROJECT_FILES {
        let file = dir.join(name);
        if context.files().exists(&file)? {
            context_trace!(context, "Found project file: {:?}", file);
            candidates.push(file);
        }
    }

    let Some((winner, rest)) = candidates.split_first() else {
        return Ok(None);
    };
    let winner_content = context.files().read(winner)?;
    for other in rest {
        if context.files().read(other)? != winner_content {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{:?} and {:?} found in {:?} but the contents are different",
                    winner.file_name(),
                    other.file_name(),
                    dir
                ),
            ));
        }
    }
    Ok(Some(winner.clone()))
}

/// Name of the on-disk stash directory for a given (canonicalized) project
/// directory: `<dir-name>-<sha1-of-canonical-path>`, matching what `gel
/// project init` writes under `<config_dir>/projects/`.
fn stash_name(canonical_path: &Path) -> OsString {
    let mut hasher = Sha1::new();
    hasher.update(canonical_path.as_os_str().as_encoded_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let mut name = canonical_path
        .file_name()
        .unwrap_or(OsStr::new(""))
        .to_os_string();
    name.push("-");
    name.push(hash);
    name
}

fn stash_dir_for(context: &mut impl BuildContext, project_dir: &Path) -> PathBuf {
    let canonical = context
        .files()
        .canonicalize(project_dir)
        .unwrap_or_else(|_| project_dir.to_path_buf());
    Path::new("projects").join(stash_name(&canonical))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Project {
    pub cloud_profile: Option<String>,
    pub instance_name: InstanceName,
    pub project_path: Option<PathBuf>,
    pub branch: Option<String>,
    pub database: Option<String>,
}

impl Project {
    #[cfg(test)]
    pub fn new(instance_name: InstanceName) -> Self {
        Self {
            cloud_profile: None,
            instance_name,
            project_path: None,
            branch: None,
            database: None,
        }
    }

    /// Reads the flat per-field files a stash directory holds
    /// (`instance-name`, `cloud-profile`, `project-path`, `branch`,
    /// `database`) -- anything but a present, parseable `instance-name`
    /// means there is no usable stashed project.
    fn load(stash_dir: &Path, context: &mut impl BuildContext) -> Option<Self> {
        let cloud_profile = context
            .read_config_file::<String>(&stash_dir.join("cloud-profile"))
            .unwrap_or_default();
        let instance_name = context
            .read_config_file::<InstanceName>(&stash_dir.join("instance-name"))
            .unwrap_or_default()?;
        let project_path = context
            .read_config_file::<PathBuf>(&stash_dir.join("project-path"))
            .unwrap_or_default();
        let branch = context
            .read_config_file::<String>(&stash_dir.join("branch"))
            .unwrap_or_default();
        let database = context
            .read_config_file::<String>(&stash_dir.join("database"))
            .unwrap_or_default();

        Some(Self {
            cloud_profile,
            instance_name,
            project_path,
            branch,
            database,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{file::SystemFileAccess, gel::BuildContextImpl};
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use super::*;

    #[test]
    fn test_stash_examples() {
        let files = HashMap::from_iter([
            (Path::new("/home/edgedb/test/gel.toml"),
            ""),
            (Path::new("/home/edgedb/.config/edgedb/projects/test-cf3c86df8fc33fbb73a47671ac5762eda8219158/instance-name"),
            "instance-name"),
        ]);

        let traces = Arc::new(Mutex::new(Vec::new()));
        let traces_clone = traces.clone();

        let mut context = BuildContextImpl::new_with((), files);
        context.tracing = Some(Box::new(move |s| {
            traces_clone.lock().unwrap().push(s.to_string())
        }));
        context.config_dir = Some(vec![PathBuf::from("/home/edgedb/.config/edgedb")]);
        let res = find_project_file(
            &mut context,
            ProjectDir::Search(PathBuf::from("/home/edgedb/test")),
        );

        for trace in traces.lock().unwrap().iter() {
            eprintln!("{}", trace);
        }
        let res = res.unwrap().unwrap();
        assert_eq!(
            res.project_path,
            PathBuf::from("/home/edgedb/test/gel.toml")
        );
        assert_eq!(
            res.project,
            Some(Project::new(InstanceName::Local(
                "instance-name".to_string()
            )))
        );
    }

    #[test]
    fn test_project_file_priority() {
        use std::fs;

        let temp = tempfile::tempdir().unwrap();
        let base = temp.path();

        let gel_path = base.join("gel.toml");
        let edgedb_path = base.join("edgedb.toml");

        let mut context = BuildContextImpl::new_with((), SystemFileAccess);

        // Test gel.toml only
        fs::write(&gel_path, "test1").unwrap();
        let found = find_project_file(&mut context, ProjectDir::Search(base.to_path_buf()))
            .unwrap()
            .unwrap();
        assert_eq!(found.project_path, gel_path);

        // Test edgedb.toml only
        fs::remove_file(&gel_path).unwrap();
        fs::write(&edgedb_path, "test2").unwrap();
        let found = find_project_file(&mut context, ProjectDir::Search(base.to_path_buf()))
            .unwrap()
            .unwrap();
        assert_eq!(found.project_path, edgedb_path);

        // Test both files with same content
        fs::write(&gel_path, "test3").unwrap();
        fs::write(&edgedb_path, "test3").unwrap();
        let found = find_project_file(&mut context, ProjectDir::Search(base.to_path_buf()))
            .unwrap()
            .unwrap();
        assert_eq!(found.project_path, gel_path);

        // Test both files with different content
        fs::write(&gel_path, "test4").unwrap();
        fs::write(&edgedb_path, "test5").unwrap();
        let err =
            find_project_file(&mut context, ProjectDir::Search(base.to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("but the contents are different"));
    }
}
