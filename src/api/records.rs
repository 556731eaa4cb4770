use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::AppState;
use crate::db::RecordPage;
use crate::domain::record::one_or_many;
use crate::domain::{
    Attachment, BasicData, InspectionRecord, InspectionResults, NewRecord, RecordFilter,
    RecordUpdate,
};
use crate::error::AppError;

const DEFAULT_CREATED_BY: &str = "admin";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub success: bool,
    pub records: Vec<InspectionRecord>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub pages: i64,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub institution_name: Option<String>,
    pub location: Option<String>,
    pub pharmacist_name: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub violations_text: Option<String>,
    pub work_entities: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub records: Vec<InspectionRecord>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct RecordDetailResponse {
    pub success: bool,
    pub record: InspectionRecord,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub success: bool,
    pub message: String,
    pub record: InspectionRecord,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Body sent by the inspection form: flat snake_case fields.
#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    pub serial_number: Option<String>,
    pub day: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub institution_name: Option<String>,
    pub location: Option<String>,
    pub pharmacist_name: Option<String>,
    pub inspection_reason: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub inspector_name: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub work_entities: Vec<String>,
    #[serde(default)]
    pub inspection_results: InspectionResults,
    pub recommendations: Option<String>,
    pub created_by: Option<String>,
}

impl CreateRecordRequest {
    fn basic_data(&self) -> BasicData {
        BasicData {
            day: non_blank(&self.day),
            date: non_blank(&self.date),
            time: non_blank(&self.time),
            institution_name: non_blank(&self.institution_name),
            inspection_location: non_blank(&self.location),
            present_pharmacist: non_blank(&self.pharmacist_name),
            inspection_reason: non_blank(&self.inspection_reason),
            inspector_name: self.inspector_name.clone(),
            work_place: self.work_entities.clone(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{} must be YYYY-MM-DD", field))),
    }
}

pub async fn list_records(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<ListResponse>, AppError> {
    let Query(params) = query?;
    let defaults = RecordPage::default();
    let page = RecordPage::new(
        params.page.unwrap_or(defaults.page),
        params.per_page.unwrap_or(defaults.per_page),
    );

    let (records, total) = state
        .repo
        .list_records(page, params.search.as_deref())
        .await?;

    Ok(Json(ListResponse {
        success: true,
        records,
        total,
        page: page.page,
        per_page: page.per_page,
        pages: page.page_count(total),
    }))
}

pub async fn search_records(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Query(params) = query?;
    let filter = RecordFilter {
        date_from: parse_date("date_from", params.date_from.as_deref())?,
        date_to: parse_date("date_to", params.date_to.as_deref())?,
        institution_name: params.institution_name,
        location: params.location,
        pharmacist_name: params.pharmacist_name,
        violations_text: params.violations_text,
        work_entities: params.work_entities,
    };

    let records: Vec<InspectionRecord> = state
        .repo
        .all_records()
        .await?
        .into_iter()
        .filter(|r| filter.matches(r))
        .collect();

    Ok(Json(SearchResponse {
        success: true,
        total: records.len(),
        records,
    }))
}

pub async fn get_record(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RecordDetailResponse>, AppError> {
    let record = state
        .repo
        .get_record(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Record not found".into()))?;
    let attachments = state.repo.list_attachments_for_record(&id).await?;

    Ok(Json(RecordDetailResponse {
        success: true,
        record,
        attachments,
    }))
}

pub async fn create_record(
    State(state): State<AppState>,
    payload: Result<Json<CreateRecordRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RecordResponse>), AppError> {
    let Json(request) = payload?;

    let basic_data = request.basic_data();
    basic_data.validate().map_err(AppError::BadRequest)?;

    let serial_number = match non_blank(&request.serial_number) {
        Some(serial) => serial,
        None => state.repo.next_serial_number(Utc::now().year()).await?,
    };
    let created_by = non_blank(&request.created_by).unwrap_or_else(|| DEFAULT_CREATED_BY.into());

    let record = InspectionRecord::new(NewRecord {
        serial_number,
        basic_data,
        inspection_results: request.inspection_results,
        recommendations: request.recommendations,
        created_by,
    });
    state.repo.insert_record(&record).await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordResponse {
            success: true,
            message: "Record created successfully".to_string(),
            record,
        }),
    ))
}

pub async fn update_record(
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<RecordUpdate>, JsonRejection>,
) -> Result<Json<RecordResponse>, AppError> {
    let Json(mut update) = payload?;

    if let Some(serial) = update.serial_number.as_deref() {
        if serial.trim().is_empty() {
            return Err(AppError::BadRequest("serialNumber must not be empty".into()));
        }
        update.serial_number = Some(serial.trim().to_string());
    }
    if let Some(basic_data) = &update.basic_data {
        basic_data.validate().map_err(AppError::BadRequest)?;
    }

    let mut record = state
        .repo
        .get_record(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Record not found".into()))?;
    record.apply(update);

    if !state.repo.update_record(&record).await? {
        return Err(AppError::NotFound("Record not found".into()));
    }

    info!(id = %record.id, "Inspection record updated");
    Ok(Json(RecordResponse {
        success: true,
        message: "Record updated successfully".to_string(),
        record,
    }))
}

pub async fn delete_record(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.repo.delete_record(&id).await? {
        return Err(AppError::NotFound("Record not found".into()));
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "Record deleted successfully".to_string(),
    }))
}
