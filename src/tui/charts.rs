use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Color,
    style::Style,
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph,
    },
    Frame,
};

use crate::viewer::fsc::FscView;
use crate::viewer::histogram::Histogram;

/// Inner area of a bordered box.
fn inner(area: Rect) -> Rect {
    if area.width > 2 && area.height > 2 {
        Rect {
            x: area.x + 1,
            y: area.y + 1,
            width: area.width.saturating_sub(2),
            height: area.height.saturating_sub(2),
        }
    } else {
        area
    }
}

/// Helper function to render a chart with a metrics line inside the same bordered box
pub fn render_chart_with_metrics_inside(
    f: &mut Frame,
    area: Rect,
    datasets: Vec<Dataset>,
    x_axis: Axis,
    y_axis: Axis,
    title: Line,
    metrics: Line,
) {
    let chart_metrics = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(2)].as_ref())
        .split(inner(area));

    let chart = Chart::new(datasets).x_axis(x_axis).y_axis(y_axis);
    f.render_widget(chart, chart_metrics[0]);
    f.render_widget(
        Paragraph::new(metrics).alignment(Alignment::Center),
        chart_metrics[1],
    );

    let block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(block, area);
}

fn metrics_line<'a>(metrics: (f64, f64, f64, f64), color: Color) -> Line<'a> {
    let (mean_val, median_val, p25_val, p75_val) = metrics;
    Line::from(vec![
        Span::styled("avg", Style::default().fg(Color::Gray)),
        Span::styled(format!(" {:.3}", mean_val), Style::default().fg(color)),
        Span::raw(" "),
        Span::styled("med", Style::default().fg(Color::Gray)),
        Span::styled(format!(" {:.3}", median_val), Style::default().fg(color)),
        Span::raw(" "),
        Span::styled("p25", Style::default().fg(Color::Gray)),
        Span::styled(format!(" {:.3}", p25_val), Style::default().fg(color)),
        Span::raw(" "),
        Span::styled("p75", Style::default().fg(Color::Gray)),
        Span::styled(format!(" {:.3}", p75_val), Style::default().fg(color)),
    ])
}

pub fn draw_fsc(area: Rect, f: &mut Frame, view: &FscView) {
    let points = view.points();
    let max_x = points
        .iter()
        .map(|(x, _)| *x)
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);
    let min_y = points
        .iter()
        .map(|(_, y)| *y)
        .fold(0.0_f64, f64::min)
        .min(0.0);
    let threshold = [(0.0, view.threshold), (max_x, view.threshold)];
    let fdr_marker = view
        .fdr_fsc
        .filter(|r| *r > 0.0)
        .map(|r| [(1.0 / r, min_y), (1.0 / r, 1.0)]);

    let mut datasets = vec![
        Dataset::default()
            .name("FSC")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Green))
            .data(&points),
        Dataset::default()
            .name(format!("{}", view.threshold))
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&threshold),
    ];
    if let Some(marker) = &fdr_marker {
        datasets.push(
            Dataset::default()
                .name("1% FDR")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Magenta))
                .data(marker),
        );
    }

    let x_axis = Axis::default()
        .title("1/A")
        .style(Style::default().fg(Color::Gray))
        .bounds([0.0, max_x])
        .labels(["0".to_string(), format!("{:.3}", max_x / 2.0), format!("{:.3}", max_x)]);
    let y_axis = Axis::default()
        .title("FSC")
        .style(Style::default().fg(Color::Gray))
        .bounds([min_y, 1.0])
        .labels([format!("{:.1}", min_y), "0.5".to_string(), "1.0".to_string()]);

    let metrics = Line::from(view.headline().join("   "));
    render_chart_with_metrics_inside(
        f,
        area,
        datasets,
        x_axis,
        y_axis,
        Line::from(Span::styled(
            "Fourier Shell Correlation",
            Style::default().fg(Color::Cyan),
        )),
        metrics,
    );
}

pub fn draw_histogram(
    area: Rect,
    f: &mut Frame,
    hist: &Histogram,
    metrics: Option<(f64, f64, f64, f64)>,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)].as_ref())
        .split(area);

    let bars: Vec<Bar> = hist
        .counts
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Bar::default()
                .value(c)
                .label(Line::from(format!("{:.2}", hist.edges[i])))
                .style(Style::default().fg(Color::Green))
        })
        .collect();

    let num_bars = bars.len().max(1);
    let chart_width = chunks[0].width.saturating_sub(2) as usize;
    let bar_width = ((chart_width / num_bars).saturating_sub(1)).max(1) as u16;

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Confidence histogram (significance vs # of counts)"),
        )
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1);
    f.render_widget(chart, chunks[0]);

    let footer = match metrics {
        Some(m) => metrics_line(m, Color::Green),
        None => Line::from("Not enough voxels for statistics"),
    };
    f.render_widget(
        Paragraph::new(footer)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );
}
