// meshlink-core/src/locator.rs
// Finds the client CLI and daemon binaries on each platform
use meshlink_common::{BinaryPaths, CommandSpec, InstallFlavor, MeshConfig, PlatformKind};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::exec::CommandExecutor;

const BUNDLE_BINARY: &str = "Contents/MacOS/Tailscale";
const SPOTLIGHT_BUNDLE_IDS: &[&str] = &["com.tailscale.ipn.macsys", "io.tailscale.ipn.macos"];
const SPOTLIGHT_TIMEOUT: Duration = Duration::from_secs(5);

/// One place a binary may live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// Directories on the process search path
    SearchPath,
    /// A fixed directory
    Directory(PathBuf),
    /// A directory relative to the home directory
    HomeDirectory(PathBuf),
    /// The configured daemon path relative to the home directory
    DaemonHomePath,
    /// Spotlight lookup of app bundle identifiers
    Spotlight(Vec<String>),
    /// `Tailscale*.app` bundles in a fixed directory
    AppBundles(PathBuf),
    /// `Tailscale*.app` bundles in a directory relative to home
    HomeAppBundles(PathBuf),
    /// The configured GUI client path
    GuiOverride,
}

impl CandidateSource {
    /// Sources that point inside a GUI app bundle
    pub fn is_gui(&self) -> bool {
        matches!(
            self,
            CandidateSource::Spotlight(_)
                | CandidateSource::AppBundles(_)
                | CandidateSource::HomeAppBundles(_)
                | CandidateSource::GuiOverride
        )
    }
}

/// Ordered candidate sources per binary; first match wins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorStrategy {
    pub client: Vec<CandidateSource>,
    pub daemon: Vec<CandidateSource>,
}

impl LocatorStrategy {
    pub fn for_platform(platform: PlatformKind) -> Self {
        use CandidateSource::*;
        let dirs = |paths: &[&str]| -> Vec<CandidateSource> {
            paths.iter().map(|p| Directory(PathBuf::from(p))).collect()
        };

        match platform {
            PlatformKind::Linux => {
                let mut client = vec![SearchPath];
                client.extend(dirs(&[
                    "/usr/bin",
                    "/usr/sbin",
                    "/usr/local/bin",
                    "/usr/local/sbin",
                    "/snap/bin",
                ]));
                let mut daemon = client.clone();
                daemon.push(DaemonHomePath);
                Self { client, daemon }
            }
            PlatformKind::MacOS => {
                // Package-manager installs first: they ship both binaries
                let mut package = vec![SearchPath];
                package.extend(dirs(&["/opt/homebrew/bin", "/usr/local/bin"]));
                package.push(HomeDirectory(PathBuf::from(".homebrew/bin")));

                let mut client = package.clone();
                client.push(Spotlight(SPOTLIGHT_BUNDLE_IDS.iter().map(|s| s.to_string()).collect()));
                client.push(AppBundles(PathBuf::from("/Applications")));
                client.push(HomeAppBundles(PathBuf::from("Applications")));
                client.push(HomeAppBundles(PathBuf::from("Downloads")));
                client.push(AppBundles(PathBuf::from("/Users/Shared")));
                client.push(GuiOverride);

                let mut daemon = package;
                daemon.extend(dirs(&["/opt/homebrew/sbin", "/usr/local/sbin"]));
                daemon.push(DaemonHomePath);
                Self { client, daemon }
            }
            PlatformKind::Windows => {
                let mut client = vec![SearchPath];
                client.extend(dirs(&[
                    r"C:\Program Files\Tailscale",
                    r"C:\Program Files (x86)\Tailscale",
                ]));
                Self {
                    daemon: client.clone(),
                    client,
                }
            }
        }
    }
}

/// Resolves [`BinaryPaths`] fresh on every call
pub struct BinaryLocator {
    platform: PlatformKind,
    strategy: LocatorStrategy,
    client_name: String,
    daemon_name: String,
    gui_client_path: PathBuf,
    daemon_home_path: PathBuf,
    search_path: Option<OsString>,
    home: Option<PathBuf>,
    executor: Arc<dyn CommandExecutor>,
}

impl BinaryLocator {
    pub fn new(platform: PlatformKind, config: &MeshConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            platform,
            strategy: LocatorStrategy::for_platform(platform),
            client_name: platform.executable_name(&config.client_binary),
            daemon_name: platform.executable_name(&config.daemon_binary),
            gui_client_path: config.gui_client_path.clone(),
            daemon_home_path: config.daemon_home_path.clone(),
            search_path: std::env::var_os("PATH"),
            home: dirs::home_dir(),
            executor,
        }
    }

    pub fn with_strategy(mut self, strategy: LocatorStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn platform(&self) -> PlatformKind {
        self.platform
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn daemon_name(&self) -> &str {
        &self.daemon_name
    }

    /// Never fails; a binary that cannot be found is left absent
    pub fn locate(&self) -> BinaryPaths {
        let Some((client, source)) = self.find(&self.client_name, &self.strategy.client) else {
            debug!(binary = %self.client_name, "client binary not found");
            return BinaryPaths::missing();
        };

        let flavor = match self.platform {
            PlatformKind::Windows => InstallFlavor::WindowsService,
            _ if source.is_gui() => InstallFlavor::GuiBundle,
            _ => InstallFlavor::Standalone,
        };
        let daemon = self
            .find(&self.daemon_name, &self.strategy.daemon)
            .map(|(path, _)| path);

        let paths = BinaryPaths {
            client: Some(client),
            daemon,
            flavor,
        };
        debug!(?paths, "located binaries");
        paths
    }

    fn find<'a>(&self, name: &str, sources: &'a [CandidateSource]) -> Option<(PathBuf, &'a CandidateSource)> {
        sources.iter().find_map(|source| {
            self.candidates(source, name)
                .into_iter()
                .find(|path| path.is_file())
                .map(|path| (path, source))
        })
    }

    fn candidates(&self, source: &CandidateSource, name: &str) -> Vec<PathBuf> {
        match source {
            CandidateSource::SearchPath => self.on_search_path(name).into_iter().collect(),
            CandidateSource::Directory(dir) => vec![dir.join(name)],
            CandidateSource::HomeDirectory(dir) => self.in_home(dir).map(|d| d.join(name)).into_iter().collect(),
            CandidateSource::DaemonHomePath => self.in_home(&self.daemon_home_path).into_iter().collect(),
            CandidateSource::Spotlight(bundle_ids) => self.spotlight(bundle_ids),
            CandidateSource::AppBundles(dir) => app_bundles(dir),
            CandidateSource::HomeAppBundles(dir) => self.in_home(dir).map(|d| app_bundles(&d)).unwrap_or_default(),
            CandidateSource::GuiOverride => vec![self.gui_client_path.clone()],
        }
    }

    fn on_search_path(&self, name: &str) -> Option<PathBuf> {
        let paths = self.search_path.as_ref()?;
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(name, Some(paths), cwd).ok()
    }

    fn in_home(&self, relative: &Path) -> Option<PathBuf> {
        self.home.as_ref().map(|home| home.join(relative))
    }

    fn spotlight(&self, bundle_ids: &[String]) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for bundle_id in bundle_ids {
            let spec = CommandSpec::new("mdfind")
                .arg(format!("kMDItemCFBundleIdentifier == '{bundle_id}'"))
                .timeout(SPOTLIGHT_TIMEOUT);
            // Spotlight is best effort: disabled indexes or a missing mdfind just fall through
            match self.executor.execute(&spec) {
                Ok(result) if result.success() => {
                    found.extend(
                        result
                            .stdout
                            .lines()
                            .map(str::trim)
                            .filter(|line| !line.is_empty())
                            .map(|app| Path::new(app).join(BUNDLE_BINARY)),
                    );
                }
                Ok(_) => {}
                Err(err) => debug!(error = %err, "spotlight lookup failed"),
            }
        }
        found
    }
}

/// Binaries inside `Tailscale*.app` bundles directly under `dir`, sorted by name
fn app_bundles(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut bundles: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            name.starts_with("tailscale") && name.ends_with(".app")
        })
        .map(|entry| entry.path())
        .collect();
    bundles.sort();
    bundles.into_iter().map(|bundle| bundle.join(BUNDLE_BINARY)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fail, ok, ScriptedExecutor};
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    fn locator(platform: PlatformKind, exec: Arc<ScriptedExecutor>) -> BinaryLocator {
        BinaryLocator::new(platform, &MeshConfig::default(), exec)
            .with_search_path(None)
            .with_home(None)
    }

    fn no_spotlight() -> Arc<ScriptedExecutor> {
        Arc::new(ScriptedExecutor::new(|_| fail(1, "")))
    }

    #[test]
    fn test_strategy_order_linux() {
        let strategy = LocatorStrategy::for_platform(PlatformKind::Linux);
        assert_eq!(strategy.client[0], CandidateSource::SearchPath);
        assert_eq!(strategy.daemon.last(), Some(&CandidateSource::DaemonHomePath));
        assert!(strategy.client.iter().all(|s| !s.is_gui()));
    }

    #[test]
    fn test_strategy_order_macos_prefers_package_manager() {
        let strategy = LocatorStrategy::for_platform(PlatformKind::MacOS);
        let first_gui = strategy.client.iter().position(CandidateSource::is_gui).unwrap();
        let last_package = strategy.client.iter().rposition(|s| !s.is_gui()).unwrap();
        assert!(last_package < first_gui);
        assert!(strategy.daemon.iter().all(|s| !s.is_gui()));
        assert_eq!(strategy.client.last(), Some(&CandidateSource::GuiOverride));
    }

    #[test]
    fn test_locate_both_on_search_path() {
        let bin = TempDir::new().unwrap();
        touch(&bin.path().join("tailscale"));
        touch(&bin.path().join("tailscaled"));

        let paths = locator(PlatformKind::Linux, no_spotlight())
            .with_strategy(LocatorStrategy {
                client: vec![CandidateSource::SearchPath],
                daemon: vec![CandidateSource::SearchPath],
            })
            .with_search_path(Some(bin.path().as_os_str().to_owned()))
            .locate();

        assert_eq!(paths.client, Some(bin.path().join("tailscale")));
        assert_eq!(paths.daemon, Some(bin.path().join("tailscaled")));
        assert_eq!(paths.flavor, InstallFlavor::Standalone);
        assert!(paths.is_complete());
    }

    #[test]
    fn test_missing_client_leaves_everything_absent() {
        let bin = TempDir::new().unwrap();
        touch(&bin.path().join("tailscaled"));

        let paths = locator(PlatformKind::Linux, no_spotlight())
            .with_strategy(LocatorStrategy {
                client: vec![CandidateSource::Directory(bin.path().to_path_buf())],
                daemon: vec![CandidateSource::Directory(bin.path().to_path_buf())],
            })
            .locate();

        assert_eq!(paths, BinaryPaths::missing());
        assert!(!paths.is_complete());
    }

    #[test]
    fn test_client_without_daemon_is_incomplete() {
        let bin = TempDir::new().unwrap();
        touch(&bin.path().join("tailscale"));

        let paths = locator(PlatformKind::Linux, no_spotlight())
            .with_strategy(LocatorStrategy {
                client: vec![CandidateSource::Directory(bin.path().to_path_buf())],
                daemon: vec![CandidateSource::Directory(bin.path().to_path_buf())],
            })
            .locate();

        assert!(paths.client.is_some());
        assert!(paths.daemon.is_none());
        assert!(!paths.is_complete());
    }

    #[test]
    fn test_daemon_home_path_fallback() {
        let home = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        touch(&bin.path().join("tailscale"));
        touch(&home.path().join(".homebrew/bin/tailscaled"));

        let paths = locator(PlatformKind::Linux, no_spotlight())
            .with_home(Some(home.path().to_path_buf()))
            .with_strategy(LocatorStrategy {
                client: vec![CandidateSource::Directory(bin.path().to_path_buf())],
                daemon: vec![CandidateSource::SearchPath, CandidateSource::DaemonHomePath],
            })
            .locate();

        assert_eq!(paths.daemon, Some(home.path().join(".homebrew/bin/tailscaled")));
    }

    #[test]
    fn test_gui_bundle_in_home_applications() {
        let home = TempDir::new().unwrap();
        touch(&home.path().join("Applications/Tailscale.app").join(BUNDLE_BINARY));

        let paths = locator(PlatformKind::MacOS, no_spotlight())
            .with_home(Some(home.path().to_path_buf()))
            .with_strategy(LocatorStrategy {
                client: vec![
                    CandidateSource::SearchPath,
                    CandidateSource::HomeAppBundles(PathBuf::from("Applications")),
                ],
                daemon: vec![CandidateSource::SearchPath],
            })
            .locate();

        assert_eq!(paths.flavor, InstallFlavor::GuiBundle);
        assert!(paths.daemon.is_none());
        assert!(paths.is_complete());
    }

    #[test]
    fn test_package_manager_beats_gui_bundle() {
        let brew = TempDir::new().unwrap();
        let apps = TempDir::new().unwrap();
        touch(&brew.path().join("tailscale"));
        touch(&brew.path().join("tailscaled"));
        touch(&apps.path().join("Tailscale.app").join(BUNDLE_BINARY));

        let paths = locator(PlatformKind::MacOS, no_spotlight())
            .with_strategy(LocatorStrategy {
                client: vec![
                    CandidateSource::Directory(brew.path().to_path_buf()),
                    CandidateSource::AppBundles(apps.path().to_path_buf()),
                ],
                daemon: vec![CandidateSource::Directory(brew.path().to_path_buf())],
            })
            .locate();

        assert_eq!(paths.client, Some(brew.path().join("tailscale")));
        assert_eq!(paths.flavor, InstallFlavor::Standalone);
        assert!(paths.is_complete());
    }

    #[test]
    fn test_spotlight_result_is_used() {
        let apps = TempDir::new().unwrap();
        let app = apps.path().join("Tailscale.app");
        touch(&app.join(BUNDLE_BINARY));
        let app_str = app.to_string_lossy().to_string();

        let exec = Arc::new(ScriptedExecutor::new(move |spec| {
            if spec.args[0].contains("com.tailscale.ipn.macsys") {
                ok(&format!("{app_str}\n"))
            } else {
                ok("")
            }
        }));
        let paths = locator(PlatformKind::MacOS, exec.clone())
            .with_strategy(LocatorStrategy {
                client: vec![CandidateSource::Spotlight(vec![
                    "com.tailscale.ipn.macsys".to_string(),
                    "io.tailscale.ipn.macos".to_string(),
                ])],
                daemon: vec![],
            })
            .locate();

        assert_eq!(paths.client, Some(app.join(BUNDLE_BINARY)));
        assert_eq!(paths.flavor, InstallFlavor::GuiBundle);
        assert_eq!(exec.executed_named("mdfind").len(), 2);
    }

    #[test]
    fn test_bundle_scan_ignores_other_apps() {
        let apps = TempDir::new().unwrap();
        touch(&apps.path().join("Other.app").join(BUNDLE_BINARY));
        touch(&apps.path().join("Tailscale-1.66.app").join(BUNDLE_BINARY));

        let found = app_bundles(apps.path());
        assert_eq!(found, vec![apps.path().join("Tailscale-1.66.app").join(BUNDLE_BINARY)]);
        assert!(app_bundles(&apps.path().join("missing")).is_empty());
    }

    #[test]
    fn test_gui_override_path() {
        let dir = TempDir::new().unwrap();
        let gui = dir.path().join("Tailscale");
        touch(&gui);
        let config = MeshConfig {
            gui_client_path: gui.clone(),
            ..MeshConfig::default()
        };

        let paths = BinaryLocator::new(PlatformKind::MacOS, &config, no_spotlight())
            .with_search_path(None)
            .with_home(None)
            .with_strategy(LocatorStrategy {
                client: vec![CandidateSource::GuiOverride],
                daemon: vec![],
            })
            .locate();
        assert_eq!(paths.client, Some(gui));
        assert_eq!(paths.flavor, InstallFlavor::GuiBundle);
    }

    #[test]
    fn test_windows_flavor_is_service() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("tailscale.exe"));

        let paths = locator(PlatformKind::Windows, no_spotlight())
            .with_strategy(LocatorStrategy {
                client: vec![CandidateSource::Directory(dir.path().to_path_buf())],
                daemon: vec![CandidateSource::Directory(dir.path().to_path_buf())],
            })
            .locate();
        assert_eq!(paths.flavor, InstallFlavor::WindowsService);
        assert!(paths.is_complete());
    }
}
