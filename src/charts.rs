//! Shared chart building blocks.
//!
//! Charts are described with `charming` and serialized to ECharts options.
//! Each chart is rendered into a container `div` and initialized by a small
//! script, either on page load ([charts_script]) or straight away when the
//! chart arrives in an HTMX partial ([charts_inline_script]).

use charming::{
    Chart,
    component::{Axis, Grid, Legend, Title},
    element::{
        AxisLabel, AxisPointer, AxisPointerType, AxisType, JsFunction, Tooltip, Trigger,
    },
    series::{Bar, Line},
};
use maud::{Markup, PreEscaped, html};

use crate::html::HeadElement;

/// A chart with its HTML container ID and ECharts configuration.
pub(crate) struct DashboardChart {
    /// The HTML element ID to use for the chart (kebab-case)
    pub id: &'static str,
    /// The ECharts configuration as a JSON string
    pub options: String,
}

impl DashboardChart {
    pub fn new(id: &'static str, chart: Chart) -> Self {
        Self {
            id,
            options: chart.to_string(),
        }
    }
}

/// How the values on a chart's value axis are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueFormat {
    /// US dollars, e.g. "$1,234.00".
    Currency,
    /// Plain numbers with thousands separators.
    Count,
    /// A percentage, e.g. "12.5%".
    Percent,
}

impl ValueFormat {
    fn formatter(self) -> JsFunction {
        match self {
            ValueFormat::Currency => currency_formatter(),
            ValueFormat::Count => JsFunction::new_with_args(
                "number",
                "return (number || number === 0) ? new Intl.NumberFormat('en-US').format(number) : \"-\";",
            ),
            ValueFormat::Percent => JsFunction::new_with_args(
                "number",
                "return (number || number === 0) ? number.toFixed(2) + '%' : \"-\";",
            ),
        }
    }
}

/// The container a chart is drawn into.
pub(crate) fn chart_container(chart: &DashboardChart) -> Markup {
    html!(
        div
            id=(chart.id)
            class="chart w-full min-h-[380px] rounded dark:bg-gray-100"
        {}
    )
}

/// Generates JavaScript initialization code for charts that runs once the
/// page has loaded.
///
/// Creates scripts that initialize ECharts instances with dark mode support
/// and responsive resizing.
pub(crate) fn charts_script(charts: &[DashboardChart]) -> HeadElement {
    let wrapped_script = format!(
        "document.addEventListener('DOMContentLoaded', function() {{\n{}\n}});",
        init_code(charts)
    );

    HeadElement::ScriptSource(PreEscaped(wrapped_script))
}

/// A script tag that initializes `charts` as soon as it is inserted.
///
/// HTMX runs script tags in swapped content, which is how charts in partial
/// responses get drawn.
pub(crate) fn charts_inline_script(charts: &[DashboardChart]) -> Markup {
    html!(
        script { (PreEscaped(init_code(charts))) }
    )
}

fn init_code(charts: &[DashboardChart]) -> String {
    charts
        .iter()
        .map(|chart| {
            format!(
                r#"(function() {{
                    const chartDom = document.getElementById("{}");
                    const existing = echarts.getInstanceByDom(chartDom);
                    if (existing) {{ existing.dispose(); }}
                    const chart = echarts.init(chartDom);
                    const option = {};
                    chart.setOption(option);

                    window.addEventListener('resize', chart.resize);

                    const darkModeMediaQuery = window.matchMedia('(prefers-color-scheme: dark)');
                    const updateTheme = () => {{
                        const isDarkMode = darkModeMediaQuery.matches;
                        chart.setTheme(isDarkMode ? 'dark' : 'default');
                    }}
                    darkModeMediaQuery.addEventListener('change', updateTheme);
                    updateTheme();
                }})();"#,
                chart.id, chart.options
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A chart with a title, a shared axis tooltip and the usual margins.
pub(crate) fn titled_chart(title: &str, subtitle: &str, format: ValueFormat) -> Chart {
    Chart::new()
        .title(Title::new().text(title).subtext(subtitle))
        .tooltip(value_tooltip(format))
        .legend(Legend::new().top("bottom"))
        .grid(
            Grid::new()
                .left("3%")
                .right("4%")
                .bottom(40)
                .top(70)
                .contain_label(true),
        )
}

/// Lines over a month axis, one per named series.
///
/// `None` values leave a gap so that series covering different periods can
/// share the axis.
pub(crate) fn monthly_line_chart(
    title: &str,
    subtitle: &str,
    labels: Vec<String>,
    series: Vec<(&str, Vec<Option<f64>>)>,
) -> Chart {
    let mut chart = titled_chart(title, subtitle, ValueFormat::Currency)
        .x_axis(Axis::new().type_(AxisType::Category).data(labels))
        .y_axis(
            Axis::new()
                .type_(AxisType::Value)
                .axis_label(AxisLabel::new().formatter(currency_formatter())),
        );

    for (name, data) in series {
        chart = chart.series(Line::new().name(name).data(data));
    }

    chart
}

/// Horizontal bars, drawn top to bottom in the order given.
pub(crate) fn horizontal_bar_chart(
    title: &str,
    subtitle: &str,
    series_name: &str,
    bars: Vec<(String, f64)>,
    format: ValueFormat,
) -> Chart {
    // Category axes run bottom to top, so reverse to keep the first bar on top.
    let (labels, values): (Vec<String>, Vec<f64>) = bars.into_iter().rev().unzip();

    titled_chart(title, subtitle, format)
        .x_axis(
            Axis::new()
                .type_(AxisType::Value)
                .axis_label(AxisLabel::new().formatter(format.formatter())),
        )
        .y_axis(Axis::new().type_(AxisType::Category).data(labels))
        .series(Bar::new().name(series_name).data(values))
}

#[inline]
pub(crate) fn currency_formatter() -> JsFunction {
    JsFunction::new_with_args(
        "number",
        "const currencyFormatter = new Intl.NumberFormat('en-US', {
              style: 'currency',
              currency: 'USD'
            });
            return (number || number === 0) ? currencyFormatter.format(number) : \"-\";",
    )
}

/// Creates a tooltip configuration that formats values with `format`.
fn value_tooltip(format: ValueFormat) -> Tooltip {
    Tooltip::new()
        .trigger(Trigger::Axis)
        .value_formatter(format.formatter())
        .axis_pointer(AxisPointer::new().type_(AxisPointerType::Shadow))
}
