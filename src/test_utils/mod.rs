#![allow(missing_docs)]

pub(crate) mod html;
pub(crate) mod http;
pub(crate) mod ledger;

pub(crate) use html::{
    assert_chart_exists, assert_metric, assert_valid_html, parse_html_document,
    parse_html_fragment,
};
pub(crate) use http::{assert_status_ok, get_header};
pub(crate) use ledger::{get_test_connection, seed_monthly_category};
