use axum::{body::Body, response::Response};
use scraper::{Html, Selector};

pub(crate) async fn parse_html_document(response: Response<Body>) -> Html {
    let body = response.into_body();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Could not get response body");
    let text = String::from_utf8_lossy(&body).to_string();

    Html::parse_document(&text)
}

pub(crate) async fn parse_html_fragment(response: Response<Body>) -> Html {
    let body = response.into_body();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Could not get response body");
    let text = String::from_utf8_lossy(&body).to_string();

    Html::parse_fragment(&text)
}

#[track_caller]
pub(crate) fn assert_valid_html(html: &Html) {
    assert!(
        html.errors.is_empty(),
        "Got HTML parsing errors: {:?}",
        html.errors
    );
}

#[track_caller]
pub(crate) fn assert_chart_exists(html: &Html, chart_id: &str) {
    let selector = Selector::parse(&format!("#{chart_id}")).unwrap();
    assert!(
        html.select(&selector).next().is_some(),
        "Chart with id '{chart_id}' not found in {}",
        html.html()
    );
}

/// Assert that the metric card labelled `label` shows `expected`.
#[track_caller]
pub(crate) fn assert_metric(html: &Html, label: &str, expected: &str) {
    let selector = Selector::parse(&format!("[data-metric='{label}']")).unwrap();
    let value = html
        .select(&selector)
        .next()
        .unwrap_or_else(|| panic!("Metric '{label}' not found in {}", html.html()))
        .text()
        .collect::<String>();

    assert_eq!(value.trim(), expected, "wrong value for metric '{label}'");
}
