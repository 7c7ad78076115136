use super::*;
use crate::sinks::{CatalogSink, DescriptionLog, MetadataWriter, SidecarMetadataWriter};
use crate::types::{DownloadedPhoto, Photo};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(String, std::path::PathBuf, String)>>,
}

#[async_trait]
impl CatalogSink for Recorder {
    async fn record(&self, photo: &DownloadedPhoto<'_>) -> crate::Result<()> {
        self.seen.lock().unwrap().push((
            photo.photo.id.clone(),
            photo.path.clone(),
            photo.username.to_string(),
        ));
        Ok(())
    }
}

struct Broken;

#[async_trait]
impl MetadataWriter for Broken {
    async fn write(&self, photo: &DownloadedPhoto<'_>) -> crate::Result<()> {
        Err(crate::Error::Metadata {
            path: photo.path.clone(),
            reason: "unsupported format".into(),
        })
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

#[async_trait]
impl CatalogSink for Broken {
    async fn record(&self, _photo: &DownloadedPhoto<'_>) -> crate::Result<()> {
        Err(crate::Error::Io(std::io::Error::other("catalog offline")))
    }
}

#[async_trait]
impl DescriptionLog for Broken {
    async fn append(&self, _photo: &Photo) -> crate::Result<()> {
        Err(crate::Error::Io(std::io::Error::other("disk full")))
    }
}

#[tokio::test]
async fn catalog_receives_file_and_owner() {
    let h = Harness::new(&[KEY_A], 50).await;
    h.mount_user(1).await;
    h.mount_page(1, &["p1"]).await;
    h.mount_assets().await;

    let recorder = Arc::new(Recorder::default());
    let downloader = h.downloader.clone().with_catalog_sink(recorder.clone());
    downloader
        .download_user_photos(USER, &CancellationToken::new())
        .await
        .unwrap();

    let seen = recorder.seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![("p1".to_string(), h.download_dir().join("alice_p1.jpg"), USER.to_string())]
    );
}

#[tokio::test]
async fn failing_collaborators_do_not_block_recording() {
    let h = Harness::new(&[KEY_A], 50).await;
    h.mount_user(2).await;
    h.mount_page(1, &["p1", "p2"]).await;
    h.mount_assets().await;

    let broken = Arc::new(Broken);
    let downloader = h
        .downloader
        .clone()
        .with_metadata_writer(broken.clone())
        .with_description_log(broken.clone())
        .with_catalog_sink(broken);

    let report = downloader
        .download_user_photos(USER, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, SessionOutcome::Complete);
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(h.saved_state().downloaded_count(), 2);
}

#[tokio::test]
async fn sidecar_writer_annotates_each_photo() {
    let h = Harness::with_config(&[KEY_A], 50, |c| c.download.write_descriptions = false).await;
    h.mount_user(1).await;
    h.mount_page(1, &["p1"]).await;
    h.mount_assets().await;

    let downloader = h
        .downloader
        .clone()
        .with_metadata_writer(Arc::new(SidecarMetadataWriter));
    downloader
        .download_user_photos(USER, &CancellationToken::new())
        .await
        .unwrap();

    let sidecar = std::fs::read_to_string(h.download_dir().join("alice_p1.json")).unwrap();
    let photo: Photo = serde_json::from_str(&sidecar).unwrap();
    assert_eq!(photo.id, "p1");
    assert_eq!(photo.tags[0].title, "nature");
    assert!(
        !h.download_dir().join("descriptions.txt").exists(),
        "description log disabled"
    );
}
