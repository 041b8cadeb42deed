use reqwest::{
    multipart::{Form, Part},
    Method,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::dashboard::{parse_json, ClientError, RecruitingClient};

/// Content of a job description upload.
#[derive(Debug, Clone)]
pub enum JobDescriptionSource {
    File { file_name: String, bytes: Vec<u8> },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JdUploadReceipt {
    pub jd_id: u64,
    #[serde(default)]
    pub candidates_matched: u64,
    #[serde(default)]
    pub extracted_requirements: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Best-effort contact details pulled from a resume to pre-fill a form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResumeDetails {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience_years: Option<u32>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub education: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub name: String,
    pub jd_id: u64,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResumeUploadReceipt {
    pub candidate_id: u64,
    #[serde(default)]
    pub matches_created: u64,
    #[serde(default)]
    pub extracted_data: Option<Value>,
}

impl RecruitingClient {
    /// Uploads a job description either as a file or as pasted text.
    pub async fn upload_job_description(
        &self,
        title: &str,
        source: JobDescriptionSource,
    ) -> Result<JdUploadReceipt, ClientError> {
        let url = self.endpoint("jd/upload", None)?;
        let form = Form::new().text("title", title.to_string());
        let form = match source {
            JobDescriptionSource::File { file_name, bytes } => {
                form.part("file", Part::bytes(bytes).file_name(file_name))
            }
            JobDescriptionSource::Text(text) => form.text("text", text),
        };

        let response = self
            .http()
            .request(Method::POST, url)
            .multipart(form)
            .send()
            .await?;
        parse_json(response).await
    }

    pub async fn extract_resume(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ResumeDetails, ClientError> {
        let url = self.endpoint("resume/extract", None)?;
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        let response = self
            .http()
            .request(Method::POST, url)
            .multipart(form)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Uploads a resume and matches it against `upload.jd_id`.
    pub async fn upload_resume(&self, upload: ResumeUpload) -> Result<ResumeUploadReceipt, ClientError> {
        let url = self.endpoint("resume/upload", None)?;
        let mut form = Form::new()
            .text("name", upload.name)
            .text("jd_id", upload.jd_id.to_string());
        for (field, value) in [
            ("email", upload.email),
            ("phone", upload.phone),
            ("gender", upload.gender),
        ] {
            if let Some(value) = value {
                form = form.text(field, value);
            }
        }
        form = form.part("file", Part::bytes(upload.bytes).file_name(upload.file_name));

        let response = self
            .http()
            .request(Method::POST, url)
            .multipart(form)
            .send()
            .await?;
        parse_json(response).await
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.trim().is_empty()))
}
