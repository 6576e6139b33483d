use axum::extract::{RawQuery, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use url::form_urlencoded;

use crate::api::board::{run_pass, DisplayOptions};
use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{resolve_pass, ControlOverrides, NavParams};

/// Display knobs carried alongside the navigation parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayParams {
    pub min_usage: Option<usize>,
    pub images: Option<bool>,
}

impl DisplayParams {
    pub fn from_query(query: &str) -> Result<Self, ApiError> {
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "min_usage" if params.min_usage.is_none() => {
                    let n: usize = value.trim().parse().map_err(|_| {
                        ApiError::BadRequest(format!("min_usage must be a whole number, got \"{}\"", value))
                    })?;
                    if n == 0 {
                        return Err(ApiError::BadRequest("min_usage must be at least 1".to_string()));
                    }
                    params.min_usage = Some(n);
                }
                "images" if params.images.is_none() => {
                    params.images = Some(parse_flag(&value).ok_or_else(|| {
                        ApiError::BadRequest(format!("images must be true or false, got \"{}\"", value))
                    })?);
                }
                _ => {}
            }
        }
        Ok(params)
    }

    pub fn options(&self, state: &AppState) -> DisplayOptions {
        DisplayOptions {
            min_usage: self.min_usage.unwrap_or(state.min_usage),
            show_images: self.images.unwrap_or(state.show_images),
        }
    }

    fn append_to(&self, query: &mut String) {
        let mut serializer = form_urlencoded::Serializer::for_suffix(query, 0);
        if let Some(n) = self.min_usage {
            serializer.append_pair("min_usage", &n.to_string());
        }
        if let Some(images) = self.images {
            serializer.append_pair("images", if images { "true" } else { "false" });
        }
        serializer.finish();
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// One render pass. Non-canonical parameters are answered with a redirect to
/// the canonical query, so repeating a settled request never rewrites it.
pub async fn board(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let query = query.unwrap_or_default();
    let display = DisplayParams::from_query(&query)?;
    let pass = resolve_pass(&NavParams::from_query(&query), &ControlOverrides::default());

    if pass.changed {
        let mut location = format!("/api/board?{}", pass.canonical.to_query());
        display.append_to(&mut location);
        tracing::debug!("Canonicalizing \"{}\" -> \"{}\"", query, location);
        return Ok(Redirect::to(&location).into_response());
    }

    let now = chrono::Local::now().naive_local();
    let model = run_pass(&state, &pass, &display.options(&state), now).await?;
    Ok(Json(model).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::tests::{default_app, get, get_json, results_csv, test_app, HEADER};
    use crate::config::AppConfig;
    use crate::fetch::StaticCsvSource;
    use axum::http::{header::LOCATION, StatusCode};
    use pretty_assertions::assert_eq;

    const HOME: &str = "/api/board?view=home&mode=combo&finish=top3&period=6m";

    #[test]
    fn test_display_params_parse() {
        let params = DisplayParams::from_query("mode=bit&min_usage=3&images=yes").unwrap();
        assert_eq!(params.min_usage, Some(3));
        assert_eq!(params.images, Some(true));

        assert!(DisplayParams::from_query("min_usage=lots").is_err());
        assert!(DisplayParams::from_query("min_usage=0").is_err());
        assert!(DisplayParams::from_query("images=maybe").is_err());
    }

    #[test]
    fn test_display_params_append() {
        let params = DisplayParams {
            min_usage: Some(2),
            images: Some(false),
        };
        let mut query = "view=home".to_string();
        params.append_to(&mut query);

        assert_eq!(query, "view=home&min_usage=2&images=false");
    }

    #[tokio::test]
    async fn test_empty_query_redirects_to_canonical() {
        let resp = get(default_app(), "/api/board").await;

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[LOCATION], HOME);
    }

    #[tokio::test]
    async fn test_invalid_values_redirect_with_display_params() {
        let resp = get(default_app(), "/api/board?mode=blade&finish=5th&min_usage=2").await;

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            resp.headers()[LOCATION],
            "/api/board?view=home&mode=blade&finish=top3&period=6m&min_usage=2"
        );
    }

    #[tokio::test]
    async fn test_detail_without_item_falls_back_home() {
        let resp = get(default_app(), "/api/board?view=detail&mode=combo&finish=top3&period=6m").await;

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[LOCATION], HOME);
    }

    #[tokio::test]
    async fn test_canonical_home() {
        let (status, json) = get_json(default_app(), HOME).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["view"], "home");
        assert_eq!(json["total"], 3);
        assert_eq!(json["row_count"], 4);
        assert_eq!(json["leaderboard"][0]["label"], "Wizard Rod 9-60 Ball");
        assert_eq!(json["leaderboard"][0]["usage"], 2);
        assert_eq!(json["leaderboard"][0]["share_display"], "66.7%");
        assert_eq!(json["canonical_query"], "view=home&mode=combo&finish=top3&period=6m");
    }

    #[tokio::test]
    async fn test_min_usage_param() {
        let (status, json) = get_json(
            default_app(),
            "/api/board?view=home&mode=combo&finish=all&period=6m&min_usage=2",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 4);
        assert_eq!(json["leaderboard"].as_array().unwrap().len(), 1);
        assert_eq!(json["leaderboard"][0]["share_display"], "50.0%");
    }

    #[tokio::test]
    async fn test_follow_detail_link() {
        let (_, home) = get_json(default_app(), HOME).await;
        let link = home["leaderboard"][0]["detail_link"].as_str().unwrap().to_string();

        let (status, detail) = get_json(default_app(), &format!("/api/board{}", link)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["view"], "detail");
        assert_eq!(detail["item"], "Wizard Rod 9-60 Ball");
        assert_eq!(detail["usage"], home["leaderboard"][0]["usage"]);
        assert_eq!(detail["rows"].as_array().unwrap().len(), 2);
        assert_eq!(detail["rows"][0]["Username"], "ana");
        assert_eq!(detail["back_link"], "?view=home&mode=combo&finish=top3&period=6m");
    }

    #[tokio::test]
    async fn test_detail_no_match_notice() {
        let (status, json) = get_json(
            default_app(),
            "/api/board?view=detail&mode=blade&item=Nobody&finish=top3&period=6m",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["usage"], 0);
        assert_eq!(json["notice"], "No rows matched under the current filters.");
    }

    #[tokio::test]
    async fn test_images_tab() {
        let source = StaticCsvSource::new()
            .with_tab("Sheet1", results_csv())
            .with_tab("Images", "PartType,Name,ImageURL\nBlade,Wizard Rod,https://img/wr.png\n");
        let app = test_app(&AppConfig::default(), source);

        let (status, json) = get_json(
            app,
            "/api/board?view=home&mode=blade&finish=top3&period=6m&images=true",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["leaderboard"][0]["image"], "https://img/wr.png");
        assert_eq!(json["notes"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_missing_images_tab_is_a_note() {
        let (status, json) = get_json(default_app(), &format!("{}&images=true", HOME)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(json["notes"][0]
            .as_str()
            .unwrap()
            .starts_with("Images unavailable"));
        assert_eq!(json["leaderboard"][0]["label"], "Wizard Rod 9-60 Ball");
    }

    #[tokio::test]
    async fn test_bad_sheet_url_is_load_error() {
        let mut config = AppConfig::default();
        config.sheet.url = "https://example.com/not-a-sheet".to_string();
        let app = test_app(&config, StaticCsvSource::new());

        let (status, json) = get_json(app, HOME).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["code"], "LOAD_ERROR");
    }

    #[tokio::test]
    async fn test_missing_placement_column() {
        let today = chrono::Local::now().date_naive().format("%Y-%m-%d");
        let csv = format!("Event,Date,Blade,Ratchet,Bit\nCup,{today},Wizard Rod,9-60,Ball\n");
        let app = || test_app(&AppConfig::default(), StaticCsvSource::new().with_tab("Sheet1", csv.clone()));

        let (status, json) =
            get_json(app(), "/api/board?view=home&mode=combo&finish=1st&period=6m").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "SCHEMA_ERROR");
        assert_eq!(json["error"]["message"], "No Placement column in the sheet");

        let (status, json) =
            get_json(app(), "/api/board?view=home&mode=combo&finish=all&period=6m").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 1);
    }

    #[tokio::test]
    async fn test_bad_display_param_is_bad_request() {
        let (status, json) = get_json(default_app(), &format!("{}&min_usage=-1", HOME)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_header_only_sheet() {
        let app = test_app(
            &AppConfig::default(),
            StaticCsvSource::new().with_tab("Sheet1", format!("{HEADER}\n")),
        );

        let (status, json) = get_json(app, HOME).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["leaderboard"].as_array().unwrap().len(), 0);
        assert_eq!(json["notice"], "No rows matched under the current filters.");
    }
}
