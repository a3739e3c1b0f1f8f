//! Integration tests for the dependency provisioner.
//!
//! The network is replaced by [`FakeHttp`], which serves canned JSON and archives
//! and counts every call.

use aipguard_core::{Endpoints, Error, HttpFetch, ProvisionConfig, Result};
use aipguard_provision::{
    Arch, AssetKind, AssetMetadata, Corpus, MetadataStore, Os, Platform, Provisioner,
};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const API: &str = "https://api.test";
const DL: &str = "https://dl.test";

#[derive(Default)]
struct FakeHttp {
    json: Mutex<HashMap<String, serde_json::Value>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    json_calls: AtomicUsize,
    download_calls: AtomicUsize,
    offline: AtomicBool,
}

impl FakeHttp {
    fn with_release(self, tag: &str) -> Self {
        self.set_release(tag);
        self
    }

    fn set_release(&self, tag: &str) {
        self.json.lock().unwrap().insert(
            format!("{API}/repos/googleapis/api-linter/releases/latest"),
            serde_json::json!({ "tag_name": tag, "name": tag }),
        );
    }

    fn set_commit(&self, repo: &str, git_ref: &str, sha: &str) {
        self.json.lock().unwrap().insert(
            format!("{API}/repos/{repo}/commits/{git_ref}"),
            serde_json::json!({ "sha": sha }),
        );
    }

    fn serve(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(url.into(), bytes);
    }

    fn calls(&self) -> usize {
        self.json_calls.load(Ordering::SeqCst) + self.download_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetch for FakeHttp {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        self.json_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::http(url, "connection refused"));
        }
        self.json
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::http(url, "HTTP 404 Not Found"))
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        Err(Error::http(url, "not served"))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::http(url, "connection refused"));
        }
        let bytes = self
            .files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::http(url, "HTTP 404 Not Found"))?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

fn tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(name).unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &content[..]).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn linux() -> Platform {
    Platform::new(Os::Linux, Arch::X86_64)
}

fn release_url(version: &str, platform: &str) -> String {
    format!(
        "{DL}/googleapis/api-linter/releases/download/v{version}/api-linter-{version}-{platform}.tar.gz"
    )
}

fn corpus_url(corpus: Corpus) -> String {
    format!(
        "{DL}/{}/archive/refs/heads/{}.tar.gz",
        corpus.repo(),
        corpus.git_ref()
    )
}

fn config(dir: &Path) -> ProvisionConfig {
    ProvisionConfig {
        endpoints: Endpoints {
            api_base: API.to_string(),
            download_base: DL.to_string(),
        },
        ..ProvisionConfig::with_data_dir(dir)
    }
}

fn provisioner(dir: &Path, http: &Arc<FakeHttp>) -> Provisioner {
    Provisioner::with_platform(config(dir), http.clone(), linux())
}

fn serve_release(http: &FakeHttp, version: &str) {
    let script = format!("#!/bin/sh\necho {version}\n");
    http.serve(
        release_url(version, "linux-amd64"),
        tarball(&[("api-linter", script.as_bytes())]),
    );
}

fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

async fn backdate(store: &MetadataStore, kind: AssetKind, by: TimeDelta) {
    let path = store.path_for(kind);
    let mut meta: AssetMetadata =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    meta.last_checked = Utc::now() - by;
    // Bypass the monotonic guard by writing the file directly
    std::fs::write(&path, serde_json::to_string(&meta).unwrap()).unwrap();
}

mod executable {
    use super::*;

    #[tokio::test]
    async fn custom_path_short_circuits_without_network() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        let custom = PathBuf::from("/opt/tools/api-linter");
        let provisioner = Provisioner::with_platform(
            ProvisionConfig {
                custom_executable_path: Some(custom.clone()),
                ..config(temp.path())
            },
            http.clone(),
            linux(),
        );

        let provisioned = provisioner.ensure(AssetKind::Executable).await.unwrap();

        assert_eq!(provisioned.path, custom);
        assert_eq!(provisioned.update, None);
        assert_eq!(http.calls(), 0);
        assert!(dir_names(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn fresh_install_downloads_extracts_and_records() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = provisioner(temp.path(), &http);

        let provisioned = provisioner.ensure_executable().await.unwrap();

        assert_eq!(provisioned.path, temp.path().join("api-linter"));
        assert!(provisioned.path.is_file());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&provisioned.path)
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0o111);
        }

        let meta = provisioner
            .store()
            .load(AssetKind::Executable)
            .await
            .unwrap();
        assert_eq!(meta.version.as_deref(), Some("1.67.2"));
        assert_eq!(meta.path, provisioned.path);

        // Temp archive and staging directory are gone
        assert_eq!(dir_names(temp.path()), vec!["api-linter", "api-linter.json"]);
    }

    #[tokio::test]
    async fn installed_and_fresh_makes_no_calls() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = provisioner(temp.path(), &http);
        provisioner.ensure_executable().await.unwrap();
        let after_install = http.calls();

        let provisioned = provisioner.ensure_executable().await.unwrap();

        assert_eq!(provisioned.update, None);
        assert_eq!(http.calls(), after_install);
    }

    #[tokio::test]
    async fn due_check_with_same_version_advances_timestamp() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = provisioner(temp.path(), &http);
        provisioner.ensure_executable().await.unwrap();
        backdate(provisioner.store(), AssetKind::Executable, TimeDelta::days(2)).await;

        let provisioned = provisioner.ensure_executable().await.unwrap();

        assert_eq!(provisioned.update, None);
        assert_eq!(http.json_calls.load(Ordering::SeqCst), 2);
        let meta = provisioner.store().load(AssetKind::Executable).await.unwrap();
        assert!(Utc::now() - meta.last_checked < TimeDelta::minutes(1));
    }

    #[tokio::test]
    async fn newer_release_is_reported_not_applied() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = provisioner(temp.path(), &http);
        provisioner.ensure_executable().await.unwrap();
        backdate(provisioner.store(), AssetKind::Executable, TimeDelta::days(2)).await;
        http.set_release("v1.68.0");

        let provisioned = provisioner.ensure_executable().await.unwrap();

        let update = provisioned.update.expect("update should be reported");
        assert_eq!(update.current.as_deref(), Some("1.67.2"));
        assert_eq!(update.latest, "1.68.0");
        assert_eq!(http.download_calls.load(Ordering::SeqCst), 1);
        let installed = std::fs::read_to_string(&provisioned.path).unwrap();
        assert!(installed.contains("1.67.2"));
    }

    #[tokio::test]
    async fn declined_update_is_not_offered_again_until_next_interval() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = provisioner(temp.path(), &http);
        provisioner.ensure_executable().await.unwrap();
        backdate(provisioner.store(), AssetKind::Executable, TimeDelta::days(2)).await;
        http.set_release("v1.68.0");

        let update = provisioner
            .ensure_executable()
            .await
            .unwrap()
            .update
            .unwrap();
        provisioner.decline_update(&update).await.unwrap();
        let calls = http.calls();

        let again = provisioner.ensure_executable().await.unwrap();
        assert_eq!(again.update, None);
        assert_eq!(http.calls(), calls);
    }

    #[tokio::test]
    async fn declining_with_lost_metadata_still_postpones_check() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = provisioner(temp.path(), &http);
        provisioner.ensure_executable().await.unwrap();
        let sidecar = provisioner.store().path_for(AssetKind::Executable);
        std::fs::write(&sidecar, b"{truncated").unwrap();

        let update = provisioner
            .ensure_executable()
            .await
            .unwrap()
            .update
            .unwrap();
        assert_eq!(update.current, None);
        provisioner.decline_update(&update).await.unwrap();
        let calls = http.calls();

        let again = provisioner.ensure_executable().await.unwrap();
        assert_eq!(again.update, None);
        assert_eq!(http.calls(), calls);
        let meta = provisioner.store().load(AssetKind::Executable).await.unwrap();
        assert_eq!(meta.version, None);
        assert_eq!(meta.path, provisioner.managed_executable_path());
    }

    #[tokio::test]
    async fn applied_update_replaces_binary() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        serve_release(&http, "1.68.0");
        let provisioner = provisioner(temp.path(), &http);
        provisioner.ensure_executable().await.unwrap();
        backdate(provisioner.store(), AssetKind::Executable, TimeDelta::days(2)).await;
        http.set_release("v1.68.0");

        let update = provisioner
            .ensure_executable()
            .await
            .unwrap()
            .update
            .unwrap();
        let path = provisioner.apply_update(&update).await.unwrap();

        assert!(std::fs::read_to_string(&path).unwrap().contains("1.68.0"));
        let meta = provisioner.store().load(AssetKind::Executable).await.unwrap();
        assert_eq!(meta.version.as_deref(), Some("1.68.0"));
    }

    #[tokio::test]
    async fn explicit_check_ignores_interval() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = provisioner(temp.path(), &http);

        assert_eq!(provisioner.check_update().await.unwrap(), None);
        assert_eq!(http.json_calls.load(Ordering::SeqCst), 0);

        provisioner.ensure_executable().await.unwrap();
        http.set_release("v1.68.0");

        let update = provisioner.check_update().await.unwrap().unwrap();
        assert_eq!(update.latest, "1.68.0");
        assert_eq!(http.json_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_binary_with_metadata_reinstalls() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = provisioner(temp.path(), &http);
        let path = provisioner.ensure_executable().await.unwrap().path;
        std::fs::remove_file(&path).unwrap();

        let provisioned = provisioner.ensure_executable().await.unwrap();

        assert!(provisioned.path.is_file());
        assert_eq!(http.download_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn corrupt_metadata_forces_check() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = provisioner(temp.path(), &http);
        provisioner.ensure_executable().await.unwrap();
        std::fs::write(
            provisioner.store().path_for(AssetKind::Executable),
            b"\0\0garbage",
        )
        .unwrap();

        let provisioned = provisioner.ensure_executable().await.unwrap();

        assert_eq!(http.json_calls.load(Ordering::SeqCst), 2);
        // Version unknown, so the latest release is offered
        let update = provisioned.update.unwrap();
        assert_eq!(update.current, None);
    }

    #[tokio::test]
    async fn failed_check_keeps_binary_and_backs_off() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = provisioner(temp.path(), &http);
        let installed = provisioner.ensure_executable().await.unwrap().path;
        backdate(provisioner.store(), AssetKind::Executable, TimeDelta::days(2)).await;
        http.offline.store(true, Ordering::SeqCst);

        let first = provisioner.ensure_executable().await.unwrap();
        let calls = http.calls();
        let second = provisioner.ensure_executable().await.unwrap();

        assert_eq!(first.path, installed);
        assert_eq!(second.path, installed);
        assert_eq!(http.calls(), calls, "second check should be suppressed");
    }

    #[tokio::test]
    async fn fresh_install_failure_is_reported_and_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        // No archive served: download 404s
        let provisioner = provisioner(temp.path(), &http);

        let err = provisioner.ensure_executable().await.unwrap_err();

        assert!(matches!(err, Error::Provisioning { .. }));
        assert!(err.to_string().contains("api-linter"));
        assert!(dir_names(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn version_resolution_failure_is_fatal_on_fresh_install() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        let provisioner = provisioner(temp.path(), &http);

        let err = provisioner.ensure_executable().await.unwrap_err();

        assert!(matches!(err, Error::Provisioning { .. }));
        assert_eq!(http.download_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn archive_without_binary_is_an_error() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        http.serve(
            release_url("1.67.2", "linux-amd64"),
            tarball(&[("README.md", b"no binary here")]),
        );
        let provisioner = provisioner(temp.path(), &http);

        assert!(provisioner.ensure_executable().await.is_err());
        assert!(!temp.path().join("api-linter").exists());
    }

    #[tokio::test]
    async fn windows_arm64_uses_amd64_release() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        http.serve(
            release_url("1.67.2", "windows-amd64"),
            tarball(&[("api-linter.exe", b"MZ")]),
        );
        let provisioner = Provisioner::with_platform(
            config(temp.path()),
            http.clone(),
            Platform::new(Os::Windows, Arch::Arm64),
        );

        let provisioned = provisioner.ensure_executable().await.unwrap();

        assert_eq!(provisioned.path, temp.path().join("api-linter.exe"));
    }

    #[tokio::test]
    async fn cross_process_lock_install() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = Provisioner::with_platform(
            ProvisionConfig {
                cross_process_lock: true,
                ..config(temp.path())
            },
            http.clone(),
            linux(),
        );

        let provisioned = provisioner.ensure_executable().await.unwrap();

        assert!(provisioned.path.is_file());
        assert!(temp.path().join(".api-linter.lock").exists());
    }

    #[tokio::test]
    async fn concurrent_installs_leave_a_complete_binary() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default().with_release("v1.67.2"));
        serve_release(&http, "1.67.2");
        let provisioner = Arc::new(provisioner(temp.path(), &http));

        let (a, b) = tokio::join!(
            provisioner.ensure_executable(),
            provisioner.ensure_executable()
        );

        let path = a.unwrap().path;
        assert_eq!(b.unwrap().path, path);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "#!/bin/sh\necho 1.67.2\n"
        );
        assert!(provisioner.store().load(AssetKind::Executable).await.is_some());
    }
}

mod corpus {
    use super::*;

    fn serve_googleapis(http: &FakeHttp, marker: &[u8]) {
        http.serve(
            corpus_url(Corpus::Googleapis),
            tarball(&[
                ("googleapis-master/google/api/http.proto", marker),
                ("googleapis-master/google/type/date.proto", b"syntax = \"proto3\";"),
            ]),
        );
    }

    #[tokio::test]
    async fn fresh_install_relocates_top_level_dir() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        http.set_commit("googleapis/googleapis", "master", "aaa111");
        serve_googleapis(&http, b"v1");
        let provisioner = provisioner(temp.path(), &http);

        let provisioned = provisioner.ensure_corpus(Corpus::Googleapis).await.unwrap();

        assert_eq!(provisioned.path, temp.path().join("googleapis"));
        assert!(provisioned.path.join("google/api/http.proto").is_file());
        let meta = provisioner
            .store()
            .load(AssetKind::Corpus(Corpus::Googleapis))
            .await
            .unwrap();
        assert_eq!(meta.version.as_deref(), Some("aaa111"));
        assert_eq!(meta.source, Some(corpus_url(Corpus::Googleapis)));
        assert_eq!(dir_names(temp.path()), vec!["googleapis", "googleapis.json"]);
        assert_eq!(provisioner.corpus_import_dirs(), vec![provisioned.path]);
    }

    #[tokio::test]
    async fn protobuf_import_dir_is_src() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        http.serve(
            corpus_url(Corpus::Protobuf),
            tarball(&[(
                "protobuf-main/src/google/protobuf/timestamp.proto",
                b"syntax = \"proto3\";",
            )]),
        );
        let provisioner = provisioner(temp.path(), &http);

        let provisioned = provisioner
            .ensure(AssetKind::Corpus(Corpus::Protobuf))
            .await
            .unwrap();

        assert_eq!(provisioned.path, temp.path().join("protobuf").join("src"));
        assert!(
            provisioned
                .path
                .join("google/protobuf/timestamp.proto")
                .is_file()
        );
    }

    #[tokio::test]
    async fn stale_corpus_with_new_commit_is_replaced() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        http.set_commit("googleapis/googleapis", "master", "aaa111");
        serve_googleapis(&http, b"v1");
        let provisioner = provisioner(temp.path(), &http);
        provisioner.ensure_corpus(Corpus::Googleapis).await.unwrap();

        let kind = AssetKind::Corpus(Corpus::Googleapis);
        backdate(provisioner.store(), kind, TimeDelta::days(8)).await;
        http.set_commit("googleapis/googleapis", "master", "bbb222");
        serve_googleapis(&http, b"v2");

        let provisioned = provisioner.ensure_corpus(Corpus::Googleapis).await.unwrap();

        let content = std::fs::read(provisioned.path.join("google/api/http.proto")).unwrap();
        assert_eq!(content, b"v2");
        let meta = provisioner.store().load(kind).await.unwrap();
        assert_eq!(meta.version.as_deref(), Some("bbb222"));
        assert_eq!(dir_names(temp.path()), vec!["googleapis", "googleapis.json"]);
    }

    #[tokio::test]
    async fn stale_corpus_with_same_commit_is_only_touched() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        http.set_commit("googleapis/googleapis", "master", "aaa111");
        serve_googleapis(&http, b"v1");
        let provisioner = provisioner(temp.path(), &http);
        provisioner.ensure_corpus(Corpus::Googleapis).await.unwrap();
        let kind = AssetKind::Corpus(Corpus::Googleapis);
        backdate(provisioner.store(), kind, TimeDelta::days(8)).await;

        provisioner.ensure_corpus(Corpus::Googleapis).await.unwrap();

        assert_eq!(http.download_calls.load(Ordering::SeqCst), 1);
        let meta = provisioner.store().load(kind).await.unwrap();
        assert!(Utc::now() - meta.last_checked < TimeDelta::minutes(1));
    }

    #[tokio::test]
    async fn fresh_corpus_is_not_rechecked() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        serve_googleapis(&http, b"v1");
        let provisioner = provisioner(temp.path(), &http);
        provisioner.ensure_corpus(Corpus::Googleapis).await.unwrap();
        let calls = http.calls();

        provisioner.ensure_corpus(Corpus::Googleapis).await.unwrap();

        assert_eq!(http.calls(), calls);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_old_copy() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        serve_googleapis(&http, b"v1");
        let provisioner = provisioner(temp.path(), &http);
        provisioner.ensure_corpus(Corpus::Googleapis).await.unwrap();
        backdate(
            provisioner.store(),
            AssetKind::Corpus(Corpus::Googleapis),
            TimeDelta::days(8),
        )
        .await;
        http.offline.store(true, Ordering::SeqCst);

        let provisioned = provisioner.ensure_corpus(Corpus::Googleapis).await.unwrap();

        let content = std::fs::read(provisioned.path.join("google/api/http.proto")).unwrap();
        assert_eq!(content, b"v1");
    }

    #[tokio::test]
    async fn failed_first_download_backs_off() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        http.offline.store(true, Ordering::SeqCst);
        let provisioner = provisioner(temp.path(), &http);

        assert!(provisioner.ensure_corpus(Corpus::Googleapis).await.is_err());
        let calls = http.calls();
        assert!(provisioner.ensure_corpus(Corpus::Googleapis).await.is_err());

        assert_eq!(http.calls(), calls);
    }

    #[tokio::test]
    async fn archive_with_several_roots_is_rejected() {
        let temp = TempDir::new().unwrap();
        let http = Arc::new(FakeHttp::default());
        http.serve(
            corpus_url(Corpus::Googleapis),
            tarball(&[("a/x.proto", b"x"), ("b/y.proto", b"y")]),
        );
        let provisioner = provisioner(temp.path(), &http);

        let err = provisioner
            .ensure_corpus(Corpus::Googleapis)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Extraction { .. }));
        assert!(dir_names(temp.path()).is_empty());
    }
}

mod over_http {
    use super::*;
    use aipguard_core::HttpClient;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn installs_from_release_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/googleapis/api-linter/releases/latest"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"tag_name": "v1.67.2"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(
                "/googleapis/api-linter/releases/download/v1.67.2/api-linter-1.67.2-linux-amd64.tar.gz",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(tarball(&[("bin/api-linter", b"#!/bin/sh\n")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let config = ProvisionConfig {
            endpoints: Endpoints {
                api_base: server.uri(),
                download_base: server.uri(),
            },
            ..ProvisionConfig::with_data_dir(temp.path())
        };
        let http = HttpClient::builder("unused.test", None, Duration::from_secs(5)).unwrap();
        let provisioner = Provisioner::with_platform(config, Arc::new(http), linux());

        let provisioned = provisioner.ensure_executable().await.unwrap();

        assert_eq!(provisioned.path, temp.path().join("api-linter"));
        assert!(provisioned.path.is_file());
    }
}
