use crate::tracking::{Experiment, Run, RunData, RunInfo, RunQuery};
use crate::traits::{StoreError, StoreResult, TrackingStore};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const API_PREFIX: &str = "api/2.0/mlflow";
const EXPERIMENTS_PAGE_SIZE: usize = 1000;
const ACTIVE_ONLY: &str = "ACTIVE_ONLY";
const NOT_FOUND_CODE: &str = "RESOURCE_DOES_NOT_EXIST";
const NOTE_TAG: &str = "mlflow.note.content";

#[derive(Debug, Serialize)]
struct SearchExperimentsRequest<'a> {
    max_results: usize,
    view_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SearchExperimentsResponse {
    #[serde(default)]
    experiments: Vec<MlflowExperiment>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MlflowExperiment {
    experiment_id: String,
    name: String,
    #[serde(default)]
    tags: Vec<MlflowTag>,
}

#[derive(Debug, Serialize)]
struct SearchRunsRequest<'a> {
    experiment_ids: &'a [String],
    max_results: usize,
    run_view_type: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    order_by: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchRunsResponse {
    #[serde(default)]
    runs: Vec<MlflowRun>,
}

#[derive(Debug, Deserialize)]
struct GetRunResponse {
    run: MlflowRun,
}

#[derive(Debug, Deserialize)]
struct MlflowRun {
    info: MlflowRunInfo,
    #[serde(default)]
    data: MlflowRunData,
}

#[derive(Debug, Deserialize)]
struct MlflowRunInfo {
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    run_uuid: Option<String>,
    #[serde(default)]
    run_name: Option<String>,
    experiment_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, deserialize_with = "de_opt_millis")]
    start_time: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_millis")]
    end_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct MlflowRunData {
    #[serde(default)]
    metrics: Vec<MlflowMetric>,
    #[serde(default)]
    params: Vec<MlflowTag>,
}

#[derive(Debug, Deserialize)]
struct MlflowMetric {
    key: String,
    #[serde(deserialize_with = "de_metric_value")]
    value: f64,
}

#[derive(Debug, Deserialize)]
struct MlflowTag {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct MlflowErrorBody {
    error_code: String,
    #[serde(default)]
    message: String,
}

/// int64 fields may arrive as JSON numbers or strings depending on the server.
fn de_opt_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Num(i64),
        Str(String),
    }

    Ok(match Option::<Millis>::deserialize(deserializer)? {
        Some(Millis::Num(n)) => Some(n),
        Some(Millis::Str(s)) => s.parse().ok(),
        None => None,
    })
}

/// Non-finite doubles are sent as `"NaN"`, `"Infinity"` or `"-Infinity"`.
fn de_metric_value<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Value {
        Num(f64),
        Str(String),
    }

    match Value::deserialize(deserializer)? {
        Value::Num(n) => Ok(n),
        Value::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid metric value: {s}"))),
    }
}

impl From<MlflowRun> for Run {
    fn from(run: MlflowRun) -> Self {
        let info = run.info;
        Run {
            info: RunInfo {
                run_id: info.run_id.or(info.run_uuid).unwrap_or_default(),
                run_name: info.run_name.filter(|n| !n.is_empty()),
                experiment_id: info.experiment_id,
                status: info.status.and_then(|s| s.parse().ok()),
                start_time: info.start_time,
                end_time: info.end_time,
            },
            data: RunData {
                metrics: run
                    .data
                    .metrics
                    .into_iter()
                    .map(|m| (m.key, m.value))
                    .collect(),
                params: run
                    .data
                    .params
                    .into_iter()
                    .map(|p| (p.key, p.value))
                    .collect(),
            },
        }
    }
}

impl From<MlflowExperiment> for Experiment {
    fn from(experiment: MlflowExperiment) -> Self {
        let description = experiment
            .tags
            .into_iter()
            .find(|t| t.key == NOTE_TAG)
            .map(|t| t.value)
            .filter(|v| !v.trim().is_empty());
        Experiment {
            experiment_id: experiment.experiment_id,
            name: experiment.name,
            description,
        }
    }
}

/// Client for the MLflow tracking server REST API.
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let url = base_url.into();
        Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> StoreResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<MlflowErrorBody>(&body) {
            Ok(err) => Err(StoreError::Api {
                code: err.error_code,
                message: err.message,
            }),
            Err(_) => Err(StoreError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[async_trait]
impl TrackingStore for RestStore {
    fn name(&self) -> &str {
        "rest"
    }

    fn location(&self) -> &str {
        &self.base_url
    }

    async fn list_experiments(&self) -> StoreResult<Vec<Experiment>> {
        let mut experiments = vec![];
        let mut page_token: Option<String> = None;

        loop {
            let body = SearchExperimentsRequest {
                max_results: EXPERIMENTS_PAGE_SIZE,
                view_type: ACTIVE_ONLY,
                page_token: page_token.as_deref(),
            };
            let response = self
                .authorize(self.client.post(self.endpoint("experiments/search")))
                .json(&body)
                .send()
                .await?;
            let page: SearchExperimentsResponse = Self::decode(response).await?;
            experiments.extend(page.experiments.into_iter().map(Experiment::from));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(experiments)
    }

    async fn search_runs(&self, query: &RunQuery) -> StoreResult<Vec<Run>> {
        // The server rejects max_results below 1.
        if query.experiment_ids.is_empty() || query.max_results == 0 {
            return Ok(vec![]);
        }

        let body = SearchRunsRequest {
            experiment_ids: &query.experiment_ids,
            max_results: query.max_results,
            run_view_type: ACTIVE_ONLY,
            order_by: query.order_by.iter().map(|o| o.to_clause()).collect(),
        };
        let response = self
            .authorize(self.client.post(self.endpoint("runs/search")))
            .json(&body)
            .send()
            .await?;
        let page: SearchRunsResponse = Self::decode(response).await?;
        Ok(page.runs.into_iter().map(Run::from).collect())
    }

    async fn get_run(&self, run_id: &str) -> StoreResult<Run> {
        let response = self
            .authorize(self.client.get(self.endpoint("runs/get")))
            .query(&[("run_id", run_id)])
            .send()
            .await?;

        match Self::decode::<GetRunResponse>(response).await {
            Ok(body) => Ok(body.run.into()),
            Err(StoreError::Api { code, .. }) if code == NOT_FOUND_CODE => {
                Err(StoreError::RunNotFound(run_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{MetricOrder, RunStatus, SortDirection};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn run_json(id: &str, accuracy: f64) -> serde_json::Value {
        json!({
            "info": {
                "run_id": id,
                "run_uuid": id,
                "run_name": format!("run-{id}"),
                "experiment_id": "7",
                "status": "FINISHED",
                "start_time": 1_700_000_000_000_i64,
                "end_time": "1700000005000",
                "lifecycle_stage": "active"
            },
            "data": {
                "metrics": [{"key": "accuracy", "value": accuracy, "timestamp": 1, "step": 3}],
                "params": [{"key": "lr", "value": "0.01"}],
                "tags": [{"key": "mlflow.user", "value": "me"}]
            }
        })
    }

    #[tokio::test]
    async fn list_experiments_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/mlflow/experiments/search"))
            .and(body_partial_json(json!({"page_token": "p2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "experiments": [{"experiment_id": "2", "name": "second"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/mlflow/experiments/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "experiments": [{
                    "experiment_id": "1",
                    "name": "first",
                    "tags": [{"key": "mlflow.note.content", "value": "notes"}]
                }],
                "next_page_token": "p2"
            })))
            .mount(&server)
            .await;

        let store = RestStore::new(format!("{}/", server.uri()));
        let experiments = store.list_experiments().await.unwrap();
        assert_eq!(experiments.len(), 2);
        assert_eq!(experiments[0].description.as_deref(), Some("notes"));
        assert_eq!(experiments[1].name, "second");
    }

    #[tokio::test]
    async fn search_runs_sends_order_and_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/mlflow/runs/search"))
            .and(header("Authorization", "Bearer tok"))
            .and(body_partial_json(json!({
                "experiment_ids": ["7"],
                "max_results": 1,
                "order_by": ["metrics.`accuracy` DESC"]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"runs": [run_json("r1", 0.9)]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(server.uri()).with_token("tok");
        let query = RunQuery::new(vec!["7".into()])
            .order_by(MetricOrder::new("accuracy", SortDirection::Desc))
            .max_results(1);
        let runs = store.search_runs(&query).await.unwrap();

        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.run_id(), "r1");
        assert_eq!(run.info.status, Some(RunStatus::Finished));
        assert_eq!(run.info.end_time, Some(1_700_000_005_000));
        assert_eq!(run.metric("accuracy"), Some(0.9));
        assert_eq!(run.data.params["lr"], "0.01");
    }

    #[tokio::test]
    async fn empty_search_skips_the_server() {
        let server = MockServer::start().await;
        let store = RestStore::new(server.uri());
        let runs = store.search_runs(&RunQuery::new(vec![])).await.unwrap();
        assert!(runs.is_empty());

        let zero = RunQuery::new(vec!["7".into()]).max_results(0);
        assert!(store.search_runs(&zero).await.unwrap().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_finite_metrics_arrive_as_strings() {
        let server = MockServer::start().await;
        let mut diverged = run_json("r2", 0.0);
        diverged["data"]["metrics"] = json!([
            {"key": "accuracy", "value": "NaN", "timestamp": 1, "step": 3},
            {"key": "loss", "value": "Infinity", "timestamp": 1, "step": 3},
            {"key": "grad", "value": "-Infinity", "timestamp": 1, "step": 3}
        ]);
        Mock::given(method("POST"))
            .and(path("/api/2.0/mlflow/runs/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "runs": [run_json("r1", 0.9), diverged]
            })))
            .mount(&server)
            .await;

        let store = RestStore::new(server.uri());
        let runs = store
            .search_runs(&RunQuery::new(vec!["7".into()]))
            .await
            .unwrap();

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].metric("accuracy"), Some(0.9));
        assert!(runs[1].metric("accuracy").unwrap().is_nan());
        assert_eq!(runs[1].metric("loss"), Some(f64::INFINITY));
        assert_eq!(runs[1].metric("grad"), Some(f64::NEG_INFINITY));
    }

    #[tokio::test]
    async fn missing_run_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/mlflow/runs/get"))
            .and(query_param("run_id", "ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error_code": "RESOURCE_DOES_NOT_EXIST",
                "message": "Run 'ghost' not found"
            })))
            .mount(&server)
            .await;

        let store = RestStore::new(server.uri());
        let err = store.get_run("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::RunNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn other_errors_keep_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/mlflow/runs/search"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error_code": "INVALID_PARAMETER_VALUE",
                "message": "bad order_by"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/mlflow/runs/get"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let store = RestStore::new(server.uri());
        let err = store
            .search_runs(&RunQuery::new(vec!["1".into()]))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Tracking server error INVALID_PARAMETER_VALUE: bad order_by"
        );

        let err = store.get_run("r1").await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 502, .. }));
    }
}
