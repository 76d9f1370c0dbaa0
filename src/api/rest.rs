use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

use crate::calculations::cost::{self, FormulaCostAnalysis, Savings};
use crate::calculations::predictive::{self, ProgressionStep, WeightProjection};
use crate::calculations::{
    self, goal_adequacy, CalculationError, NutritionTotals, NutritionalRequirements, PatientProfile,
};
use crate::nutrition::{Formula, ALL_UNITS};
use crate::recommendations::similarity::{self, MlRecommendation};
use crate::recommendations::{self, Recommendation};
use crate::reporting::{self, DistributionStats, RequisitionSummary};
use crate::requisition::{self, RequisitionData, RequisitionError, RequisitionOptions, SignatureBlock};
use crate::store::{SnapshotStore, StoreError};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        ApiResponse {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Requisition(#[from] RequisitionError),
    #[error(transparent)]
    Calculation(#[from] CalculationError),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("request task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Requisition(_) | ApiError::Calculation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(_) | ApiError::Encode(_) | ApiError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Body of `POST /requisitions`. Omitting `selectedTimes` selects the
/// configured schedule; an explicit empty list selects nothing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionRequest {
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    #[serde(default = "all_units")]
    pub unit_name: String,
    #[serde(default)]
    pub selected_times: Option<Vec<String>>,
    #[serde(default)]
    pub signatures: SignatureBlock,
}

fn all_units() -> String {
    ALL_UNITS.to_string()
}

/// Days over which a prescription's energy balance is projected
const PROJECTION_DAYS: u32 = 7;
/// Horizon for the savings of switching to the cheapest matching formula
const SAVINGS_DAYS: u32 = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionRequest {
    pub start_rate: f64,
    pub goal_rate: f64,
    pub increment: f64,
    pub step_hours: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CensusQuery {
    pub day: Option<NaiveDate>,
    pub ward: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequisitionReply {
    requisition: RequisitionData,
    summary: RequisitionSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrescriptionAssessment {
    prescription_id: String,
    totals: NutritionTotals,
    requirements: NutritionalRequirements,
    energy_adequacy: f64,   // percent of target
    protein_adequacy: f64,
    weight_projection: WeightProjection,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationReply {
    rules: Recommendation,
    similar: MlRecommendation,
    formulas: Vec<FormulaCostAnalysis>,
    daily_cost: Option<DistributionStats>,
    /// Costliest to cheapest matching formula
    switch_savings: Option<Savings>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressionReply {
    plan: Vec<ProgressionStep>,
    hours_to_goal: f64,
}

pub struct RestApi {
    store: Arc<SnapshotStore>,
    default_times: Arc<Vec<String>>,
}

impl RestApi {
    pub fn new(store: Arc<SnapshotStore>, default_times: Vec<String>) -> Self {
        RestApi {
            store,
            default_times: Arc::new(default_times),
        }
    }

    pub fn routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        self.health()
            .or(self.post_requisition())
            .or(self.post_requirements())
            .or(self.post_prescription_assessment())
            .or(self.post_progression())
            .or(self.post_recommendations())
            .or(self.get_census())
    }

    fn health(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("health")
            .and(warp::get())
            .map(|| warp::reply::json(&ApiResponse::success("ok", None)))
    }

    fn post_requisition(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let store = Arc::clone(&self.store);
        let default_times = Arc::clone(&self.default_times);

        warp::path!("requisitions")
            .and(warp::post())
            .and(warp::body::json())
            .and_then(move |request: RequisitionRequest| {
                let store = Arc::clone(&store);
                let default_times = Arc::clone(&default_times);
                async move {
                    let result =
                        run_blocking(move || build_requisition(&store, request, &default_times)).await;
                    Ok::<_, Infallible>(respond("Requisition generated", result))
                }
            })
    }

    fn post_requirements(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("calculations" / "requirements")
            .and(warp::post())
            .and(warp::body::json())
            .and_then(|profile: PatientProfile| async move {
                let result = calculations::estimate_requirements(&profile)
                    .map_err(ApiError::from)
                    .and_then(|requirements| Ok(serde_json::to_value(requirements)?));
                Ok::<_, Infallible>(respond("Requirements estimated", result))
            })
    }

    fn post_prescription_assessment(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let store = Arc::clone(&self.store);

        warp::path!("calculations" / "prescription" / String)
            .and(warp::post())
            .and(warp::body::json())
            .and_then(move |id: String, profile: PatientProfile| {
                let store = Arc::clone(&store);
                async move {
                    let result = run_blocking(move || assess_prescription(&store, &id, &profile)).await;
                    Ok::<_, Infallible>(respond("Prescription assessed", result))
                }
            })
    }

    fn post_progression(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("calculations" / "progression")
            .and(warp::post())
            .and(warp::body::json())
            .and_then(|request: ProgressionRequest| async move {
                Ok::<_, Infallible>(respond("Progression planned", progression(request)))
            })
    }

    fn post_recommendations(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let store = Arc::clone(&self.store);

        warp::path!("recommendations")
            .and(warp::post())
            .and(warp::body::json())
            .and_then(move |profile: PatientProfile| {
                let store = Arc::clone(&store);
                async move {
                    let result = run_blocking(move || recommend(&store, &profile)).await;
                    Ok::<_, Infallible>(respond("Recommendation ready", result))
                }
            })
    }

    fn get_census(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let store = Arc::clone(&self.store);

        warp::path!("reports" / "census")
            .and(warp::get())
            .and(warp::query::<CensusQuery>())
            .and_then(move |query: CensusQuery| {
                let store = Arc::clone(&store);
                async move {
                    let result = run_blocking(move || census(&store, query)).await;
                    Ok::<_, Infallible>(respond("Census computed", result))
                }
            })
    }
}

fn respond(message: &str, result: Result<serde_json::Value, ApiError>) -> WithStatus<Json> {
    match result {
        Ok(data) => warp::reply::with_status(
            warp::reply::json(&ApiResponse::success(message, Some(data))),
            StatusCode::OK,
        ),
        Err(err) => {
            warn!(error = %err, "request failed");
            warp::reply::with_status(
                warp::reply::json(&ApiResponse::error(err.to_string())),
                err.status_code(),
            )
        }
    }
}

/// Runs a handler that may reload the snapshot from disk off the async workers
async fn run_blocking<F>(handler: F) -> Result<serde_json::Value, ApiError>
where
    F: FnOnce() -> Result<serde_json::Value, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(handler).await?
}

fn build_requisition(
    store: &SnapshotStore,
    request: RequisitionRequest,
    default_times: &[String],
) -> Result<serde_json::Value, ApiError> {
    let options = RequisitionOptions {
        start_date: request.start_date,
        end_date: request.end_date,
        unit_name: request.unit_name,
        selected_times: request
            .selected_times
            .unwrap_or_else(|| default_times.to_vec()),
        signatures: request.signatures,
    };
    let snapshot = store.snapshot()?;
    let requisition = requisition::generate_requisition_data(&options, &snapshot)?;
    let summary = reporting::requisition_summary(&requisition);
    Ok(serde_json::to_value(RequisitionReply {
        requisition,
        summary,
    })?)
}

fn assess_prescription(
    store: &SnapshotStore,
    id: &str,
    profile: &PatientProfile,
) -> Result<serde_json::Value, ApiError> {
    let snapshot = store.snapshot()?;
    let prescription = snapshot
        .prescription(id)
        .ok_or_else(|| ApiError::NotFound(format!("prescription {}", id)))?;

    let requirements = calculations::estimate_requirements(profile)?;
    let totals = calculations::prescription_totals(prescription, &snapshot);
    debug!(prescription = id, kcal = totals.kcal, "prescription totals");

    Ok(serde_json::to_value(PrescriptionAssessment {
        prescription_id: prescription.id.clone(),
        energy_adequacy: goal_adequacy(totals.kcal, requirements.total_energy_kcal),
        protein_adequacy: goal_adequacy(totals.protein_g, requirements.protein_g),
        weight_projection: predictive::project_weight_change(
            totals.kcal,
            requirements.total_energy_kcal,
            PROJECTION_DAYS,
        ),
        totals,
        requirements,
    })?)
}

fn recommend(store: &SnapshotStore, profile: &PatientProfile) -> Result<serde_json::Value, ApiError> {
    let rules = recommendations::recommend(profile)?;
    let similar = similarity::ml_recommendation(profile)?;

    let snapshot = store.snapshot()?;
    let matched: Vec<Formula> = recommendations::match_formulas(&rules, &snapshot.formulas)
        .into_iter()
        .cloned()
        .collect();
    let formulas = cost::rank_formulas(&matched, rules.kcal_per_kg * profile.weight_kg);

    let daily_costs: Vec<f64> = formulas.iter().map(|f| f.daily_cost).collect();
    let switch_savings = match (formulas.first(), formulas.last()) {
        (Some(cheapest), Some(costliest)) if formulas.len() > 1 => {
            Some(cost::savings(costliest, cheapest, SAVINGS_DAYS))
        }
        _ => None,
    };

    Ok(serde_json::to_value(RecommendationReply {
        rules,
        similar,
        daily_cost: reporting::distribution_stats(&daily_costs),
        switch_savings,
        formulas,
    })?)
}

fn progression(request: ProgressionRequest) -> Result<serde_json::Value, ApiError> {
    let plan = predictive::progression_plan(
        request.start_rate,
        request.goal_rate,
        request.increment,
        request.step_hours,
    )?;
    Ok(serde_json::to_value(ProgressionReply {
        hours_to_goal: predictive::hours_to_goal(&plan),
        plan,
    })?)
}

fn census(store: &SnapshotStore, query: CensusQuery) -> Result<serde_json::Value, ApiError> {
    let snapshot = store.snapshot()?;
    let day = query.day.unwrap_or_else(|| Utc::now().date_naive());
    let mut census = reporting::ward_census(&snapshot.prescriptions, day);
    if let Some(ward) = query.ward.filter(|w| w != ALL_UNITS) {
        census.retain(|c| c.ward == ward);
    }
    Ok(serde_json::to_value(census)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::CatalogSnapshot;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn fixture() -> CatalogSnapshot {
        serde_json::from_value(json!({
            "prescriptions": [{
                "id": "rx-1", "patientId": "p-1", "patientName": "Ana", "bed": "04",
                "ward": "ICU", "startDate": "2024-03-01", "status": "active",
                "therapyType": "enteral", "systemType": "closed",
                "formulas": [{"formulaId": "f-std", "volume": 250.0, "times": ["06:00", "12:00", "18:00", "00:00"]}]
            }, {
                "id": "rx-2", "patientId": "p-2", "patientName": "Bruno", "bed": "11",
                "ward": "Clinic", "startDate": "2024-03-01", "status": "active",
                "therapyType": "oral", "systemType": "open",
                "formulas": [{"formulaId": "f-std", "volume": 200.0, "times": ["09:00"]}]
            }],
            "formulas": [{
                "id": "f-std", "name": "Standard 1.0", "billingUnit": "ml", "unitPrice": 0.02,
                "presentations": [1000.0], "kcalPerMl": 1.0, "proteinPerMl": 0.04
            }, {
                "id": "f-dense", "name": "Standard 1.5", "billingUnit": "ml", "unitPrice": 0.045,
                "presentations": [500.0], "kcalPerMl": 1.5, "proteinPerMl": 0.06
            }]
        }))
        .unwrap()
    }

    fn api() -> RestApi {
        let store = SnapshotStore::new("/nonexistent/snapshot.json", Duration::from_secs(60));
        store.prime(fixture()).unwrap();
        RestApi::new(Arc::new(store), vec!["06:00".to_string(), "12:00".to_string()])
    }

    fn profile() -> Value {
        json!({"sex": "female", "ageYears": 70.0, "weightKg": 60.0, "heightCm": 160.0})
    }

    fn body(res: &warp::http::Response<warp::hyper::body::Bytes>) -> ApiResponse {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let res = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&api().routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res).status, "success");
    }

    #[tokio::test]
    async fn test_requisition_uses_configured_times_when_omitted() {
        let res = warp::test::request()
            .method("POST")
            .path("/requisitions")
            .json(&json!({"startDate": "2024-03-10T00:00:00", "endDate": "2024-03-10T00:00:00", "unitName": "ICU"}))
            .reply(&api().routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let data = body(&res).data.unwrap();
        let rows = data["requisition"]["dietMap"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["times"], json!(["06:00", "12:00"]));
        assert_eq!(data["summary"]["patients"], json!(1));
    }

    #[tokio::test]
    async fn test_requisition_rejects_reversed_range() {
        let res = warp::test::request()
            .method("POST")
            .path("/requisitions")
            .json(&json!({
                "startDate": "2024-03-10T00:00:00",
                "endDate": "2024-03-09T00:00:00",
                "selectedTimes": ["06:00"]
            }))
            .reply(&api().routes())
            .await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body(&res).status, "error");
    }

    #[tokio::test]
    async fn test_requirements_validate_profile() {
        let routes = api().routes();
        let ok = warp::test::request()
            .method("POST")
            .path("/calculations/requirements")
            .json(&profile())
            .reply(&routes)
            .await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert!(body(&ok).data.unwrap()["totalEnergyKcal"].as_f64().unwrap() > 0.0);

        let bad = warp::test::request()
            .method("POST")
            .path("/calculations/requirements")
            .json(&json!({"sex": "male", "ageYears": 40.0, "weightKg": 0.0, "heightCm": 170.0}))
            .reply(&routes)
            .await;
        assert_eq!(bad.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_prescription_assessment() {
        let routes = api().routes();
        let res = warp::test::request()
            .method("POST")
            .path("/calculations/prescription/rx-1")
            .json(&profile())
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let data = body(&res).data.unwrap();
        assert_eq!(data["totals"]["kcal"], json!(1000.0));
        assert_eq!(data["prescriptionId"], json!("rx-1"));
        assert_eq!(data["weightProjection"]["days"], json!(7));
        assert!(data["weightProjection"]["weightChangeKg"].as_f64().unwrap() < 0.0);

        let missing = warp::test::request()
            .method("POST")
            .path("/calculations/prescription/rx-404")
            .json(&profile())
            .reply(&routes)
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recommendations_rank_catalog_formulas() {
        let res = warp::test::request()
            .method("POST")
            .path("/recommendations")
            .json(&profile())
            .reply(&api().routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let data = body(&res).data.unwrap();
        assert_eq!(data["formulas"][0]["formulaId"], json!("f-std"));
        assert_eq!(data["formulas"][1]["formulaId"], json!("f-dense"));
        assert!(data["similar"]["neighbours"].as_array().is_some());

        // 1500 kcal/day: 30.00 on f-std against 45.00 on f-dense
        let daily = data["switchSavings"]["daily"].as_f64().unwrap();
        assert!((daily - 15.0).abs() < 1e-6);
        assert!((data["switchSavings"]["total"].as_f64().unwrap() - 450.0).abs() < 1e-6);
        assert_eq!(data["dailyCost"]["count"], json!(2));
    }

    #[tokio::test]
    async fn test_progression_plan_route() {
        let routes = api().routes();
        let res = warp::test::request()
            .method("POST")
            .path("/calculations/progression")
            .json(&json!({"startRate": 20.0, "goalRate": 65.0, "increment": 20.0, "stepHours": 6.0}))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let data = body(&res).data.unwrap();
        assert_eq!(data["hoursToGoal"], json!(18.0));
        assert_eq!(data["plan"].as_array().unwrap().len(), 4);

        let stalled = warp::test::request()
            .method("POST")
            .path("/calculations/progression")
            .json(&json!({"startRate": 1e17, "goalRate": 2e17, "increment": 1.0, "stepHours": 6.0}))
            .reply(&routes)
            .await;
        assert_eq!(stalled.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_census_by_ward() {
        let res = warp::test::request()
            .method("GET")
            .path("/reports/census?day=2024-03-10&ward=Clinic")
            .reply(&api().routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let data = body(&res).data.unwrap();
        assert_eq!(data, json!([{"ward": "Clinic", "patients": 1, "enteral": 0, "parenteral": 0, "oral": 1}]));
    }
}
