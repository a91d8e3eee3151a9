use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Vision 免费额度（单位/月）。
pub const DEFAULT_FREE_TIER: i64 = 1000;
/// 默认统计窗口（天）。
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

const MONITORING_SCOPE: &str = "https://www.googleapis.com/auth/monitoring.read";
const MONITORING_ENDPOINT: &str = "https://monitoring.googleapis.com/v3";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// 需要汇总的两个 Cloud Monitoring 指标。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// API 请求次数，`int64Value`。
    RequestCount,
    /// 配额分配用量，`doubleValue`，逐点截断为整数。
    QuotaUsage,
}

impl Metric {
    pub fn metric_type(self) -> &'static str {
        match self {
            Metric::RequestCount => "serviceruntime.googleapis.com/api/request_count",
            Metric::QuotaUsage => "serviceruntime.googleapis.com/quota/allocation/usage",
        }
    }

    fn filter(self) -> String {
        format!("metric.type = \"{}\"", self.metric_type())
    }
}

/// 服务账号凭据文件中用到的字段。
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ServiceAccount {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("无法读取凭据文件 {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("凭据文件格式错误 {}", path.display()))
    }

    /// 生成 RS256 签名的 JWT 断言，有效期一小时。
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .context("服务账号私钥无效")?;
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: MONITORING_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + 3600,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .context("JWT 签名失败")
    }

    /// 用 JWT 断言换取访问令牌。
    pub fn fetch_access_token(&self, http: &Client) -> Result<String> {
        let assertion = self.assertion(Utc::now())?;
        let response = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .context("请求访问令牌失败")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("令牌端点返回 {status}：{body}"));
        }
        let token: TokenResponse = response.json().context("令牌响应格式错误")?;
        Ok(token.access_token)
    }
}

/// 统计时间窗口 `[start, end]`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QuotaWindow {
    /// 以 `end` 为终点、向前 `days` 天的窗口。
    pub fn ending_at(end: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn last_days(days: i64) -> Self {
        Self::ending_at(Utc::now(), days)
    }
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSeriesPage {
    pub time_series: Vec<TimeSeries>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TimeSeries {
    pub points: Vec<Point>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Point {
    pub value: TypedValue,
}

/// 监控点的取值。`int64Value` 在 JSON 中按字符串编码，也兼容数字。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypedValue {
    pub int64_value: Option<Value>,
    pub double_value: Option<f64>,
}

impl TypedValue {
    fn as_int64(&self) -> Result<i64> {
        match &self.int64_value {
            Some(Value::String(s)) => s
                .parse()
                .with_context(|| format!("int64Value 格式错误：{s:?}")),
            Some(Value::Number(n)) => n
                .as_i64()
                .with_context(|| format!("int64Value 超出范围：{n}")),
            Some(other) => Err(anyhow!("int64Value 类型错误：{other}")),
            None => Ok(0),
        }
    }

    fn as_truncated_double(&self) -> i64 {
        self.double_value.map_or(0, |v| v.trunc() as i64)
    }
}

/// 按指标类型汇总所有时间序列中的点；`int64Value` 无法解析时返回错误。
pub fn sum_points(metric: Metric, series: &[TimeSeries]) -> Result<i64> {
    series
        .iter()
        .flat_map(|s| s.points.iter())
        .map(|p| match metric {
            Metric::RequestCount => p.value.as_int64(),
            Metric::QuotaUsage => Ok(p.value.as_truncated_double()),
        })
        .sum()
}

/// 带访问令牌的 Cloud Monitoring 客户端。
pub struct MonitoringClient {
    http: Client,
    token: String,
    project_id: String,
    endpoint: String,
}

impl MonitoringClient {
    pub fn new(http: Client, token: String, project_id: impl Into<String>) -> Self {
        Self {
            http,
            token,
            project_id: project_id.into(),
            endpoint: MONITORING_ENDPOINT.to_string(),
        }
    }

    /// 替换 Monitoring API 根地址（不含末尾斜杠）。
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// 读取凭据、换取令牌并创建客户端。
    pub fn connect(credentials: &Path, project_id: &str) -> Result<Self> {
        let account = ServiceAccount::from_file(credentials)?;
        let http = Client::builder().build().context("无法创建 HTTP 客户端")?;
        let token = account.fetch_access_token(&http)?;
        info!(account = %account.client_email, "已获取监控访问令牌");
        Ok(Self::new(http, token, project_id))
    }

    /// 列出窗口内某个指标的全部时间序列，自动翻页。
    pub fn list_time_series(&self, metric: Metric, window: &QuotaWindow) -> Result<Vec<TimeSeries>> {
        let url = format!("{}/projects/{}/timeSeries", self.endpoint, self.project_id);
        let filter = metric.filter();
        let start = rfc3339(window.start);
        let end = rfc3339(window.end);

        let mut series = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("filter", filter.as_str()),
                ("interval.startTime", start.as_str()),
                ("interval.endTime", end.as_str()),
                ("view", "FULL"),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .query(&query)
                .send()
                .with_context(|| format!("查询 {} 失败", metric.metric_type()))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(anyhow!("Monitoring API 返回 {status}：{body}"));
            }
            let page: TimeSeriesPage = response.json().context("Monitoring 响应格式错误")?;
            debug!(metric = metric.metric_type(), series = page.time_series.len(), "page");
            series.extend(page.time_series);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(series)
    }

    pub fn report(&self, window: &QuotaWindow, free_tier_limit: i64) -> Result<QuotaReport> {
        let requests = self.list_time_series(Metric::RequestCount, window)?;
        let usage = self.list_time_series(Metric::QuotaUsage, window)?;
        Ok(QuotaReport {
            total_requests: sum_points(Metric::RequestCount, &requests)?,
            total_quota_used: sum_points(Metric::QuotaUsage, &usage)?,
            free_tier_limit,
        })
    }
}

/// 配额汇总结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaReport {
    pub total_requests: i64,
    pub total_quota_used: i64,
    pub free_tier_limit: i64,
}

impl QuotaReport {
    /// 用量不超过免费额度（含等于）即视为在免费范围内。
    pub fn within_free_tier(&self) -> bool {
        self.total_quota_used <= self.free_tier_limit
    }

    pub fn verdict(&self) -> String {
        if self.within_free_tier() {
            format!(
                "仍在免费额度内，已用 {}/{} 单位",
                self.total_quota_used, self.free_tier_limit
            )
        } else {
            format!(
                "已超出免费额度，已用 {}/{} 单位",
                self.total_quota_used, self.free_tier_limit
            )
        }
    }
}
