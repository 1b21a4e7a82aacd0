//! Round-section documents in S3, one JSON object per question set.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::info;
use uuid::Uuid;

use super::SectionStore;
use crate::question_set::documents::SectionDocument;

pub fn section_key(question_set_id: Uuid) -> String {
    format!("question-sets/{question_set_id}/sections.json")
}

#[derive(Clone)]
pub struct S3SectionStore {
    client: S3Client,
    bucket: String,
}

impl S3SectionStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    async fn put(&self, doc: &SectionDocument) -> Result<()> {
        let key = section_key(doc.question_set_id);
        let body = serde_json::to_vec(doc)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| anyhow!("S3 upload failed: {e}"))?;

        info!("Uploaded round sections to s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

#[async_trait]
impl SectionStore for S3SectionStore {
    async fn create(&self, doc: &SectionDocument) -> Result<()> {
        self.put(doc).await
    }

    /// Objects are replaced whole.
    async fn update(&self, doc: &SectionDocument) -> Result<()> {
        self.put(doc).await
    }

    async fn get(&self, question_set_id: Uuid) -> Result<Option<SectionDocument>> {
        let key = section_key(question_set_id);
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(anyhow!("S3 download failed: {service_err}"));
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| anyhow!("S3 body read failed: {e}"))?
            .into_bytes();
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
