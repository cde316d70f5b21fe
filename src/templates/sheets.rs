use crate::oauth2::{SharedCredential, TokenManager};
use crate::templates::{Template, TemplateError, TemplateResult, TemplateStore};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/";
pub const DEFAULT_SHEET_NAME: &str = "시트1";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    values: [[&'a str; 3]; 1],
}

/// Templates stored as rows of a Google spreadsheet: name, subject, body.
///
/// Requests are authorized with the same delegated credential used for
/// sending, so an expired token is refreshed here as well.
pub struct SheetsTemplateStore {
    http_client: HttpClient,
    api_base: Url,
    spreadsheet_id: String,
    sheet_name: String,
    token_manager: TokenManager,
    credential: SharedCredential,
}

impl SheetsTemplateStore {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        token_manager: TokenManager,
        credential: SharedCredential,
        timeout: Duration,
    ) -> TemplateResult<Self> {
        let spreadsheet_id = spreadsheet_id.into();
        if spreadsheet_id.trim().is_empty() {
            return Err(TemplateError::StoreUnavailable(
                "spreadsheet id is not configured".to_string(),
            ));
        }

        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TemplateError::StoreUnavailable(format!("HTTP client: {}", e)))?;

        let api_base = Url::parse(SHEETS_API_BASE)
            .map_err(|e| TemplateError::StoreUnavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base,
            spreadsheet_id,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            token_manager,
            credential,
        })
    }

    pub fn with_sheet_name(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = sheet_name.into();
        self
    }

    pub fn with_api_base(mut self, api_base: &str) -> TemplateResult<Self> {
        self.api_base = Url::parse(api_base)
            .map_err(|e| TemplateError::StoreUnavailable(format!("Invalid Sheets API base: {}", e)))?;
        Ok(self)
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    fn values_url(&self, range: &str) -> TemplateResult<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| TemplateError::StoreUnavailable("Sheets API base is not a hierarchical URL".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values"])
            .push(range);
        Ok(url)
    }

    async fn authorization(&self) -> TemplateResult<String> {
        let credential = self
            .token_manager
            .ensure_valid(&self.credential)
            .await
            .map_err(|e| TemplateError::StoreUnavailable(format!("credential: {}", e)))?;
        Ok(credential.authorization_header())
    }
}

fn row_to_template(row: Vec<String>) -> Option<Template> {
    let mut cells = row.into_iter();
    let name = cells.next().filter(|name| !name.trim().is_empty())?;
    let subject = cells.next().unwrap_or_default();
    let body = cells.next().unwrap_or_default();
    Some(Template { name, subject, body })
}

async fn unavailable(response: reqwest::Response) -> TemplateError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    TemplateError::StoreUnavailable(format!("Sheets API returned {}: {}", status, body.trim()))
}

#[async_trait]
impl TemplateStore for SheetsTemplateStore {
    async fn list(&self) -> TemplateResult<Vec<Template>> {
        let url = self.values_url(&format!("{}!A2:C", self.sheet_name))?;
        let authorization = self.authorization().await?;

        tracing::debug!("Listing templates from sheet {}", self.sheet_name);
        let response = self
            .http_client
            .get(url)
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(|e| TemplateError::StoreUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(response).await);
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| TemplateError::StoreUnavailable(format!("Malformed values response: {}", e)))?;

        let templates: Vec<Template> = range.values.into_iter().filter_map(row_to_template).collect();
        tracing::info!("Loaded {} templates", templates.len());
        Ok(templates)
    }

    async fn append(&self, template: Template) -> TemplateResult<()> {
        let mut url = self.values_url(&format!("{}!A:C:append", self.sheet_name))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        let authorization = self.authorization().await?;

        let body = AppendBody {
            values: [[
                template.name.as_str(),
                template.subject.as_str(),
                template.body.as_str(),
            ]],
        };

        tracing::info!("Appending template '{}' to sheet {}", template.name, self.sheet_name);
        let response = self
            .http_client
            .post(url)
            .header("Authorization", authorization)
            .json(&body)
            .send()
            .await
            .map_err(|e| TemplateError::StoreUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(response).await);
        }

        Ok(())
    }
}
