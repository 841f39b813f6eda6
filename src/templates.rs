use crate::processing::TrackReport;

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "—".to_string())
}

pub fn render_landing_page() -> String {
    include_str!("../templates/landing.html").to_string()
}

fn summary_card(body: &mut String, label: &str, value: &str) {
    body.push_str(&format!(
        "<div class=\"summary-card\"><p class=\"label\">{label}</p><p class=\"value\">{value}</p></div>"
    ));
}

pub fn render_report(report: &TrackReport) -> String {
    let mut body = String::new();
    let metadata = &report.metadata;
    let summary = &report.summary;

    body.push_str("<section class=\"results-card\">");
    body.push_str(&format!(
        "<div class=\"results-header\"><div><p class=\"eyebrow\">Track Overview</p><h2>{}</h2><p>{}</p></div>",
        escape_html(&metadata.name),
        escape_html(&metadata.friendly_date)
    ));
    if let Some(link) = &metadata.activity_link {
        body.push_str(&format!(
            "<a class=\"cta\" href=\"{}\">Open activity online</a>",
            escape_html(link)
        ));
    }
    body.push_str("</div>");

    body.push_str("<div class=\"summary-grid\">");
    summary_card(&mut body, "Total Distance", &format!("{} km", summary.distance));
    summary_card(
        &mut body,
        &format!("Running Distance (≥ {} km/h)", report.options.running_speed_kmh),
        &format!("{} km", summary.running_distance),
    );
    summary_card(
        &mut body,
        "Running Share",
        &or_dash(summary.running_share_percent.map(|share| format!("{share:.3}%"))),
    );
    summary_card(&mut body, "Total Time", &summary.total_time);
    summary_card(&mut body, "Running Time", &summary.running_time);
    summary_card(&mut body, "Rest Time", &summary.rest_time);
    summary_card(
        &mut body,
        "Average Speed",
        &format!("{} km/h", summary.average_speed),
    );
    summary_card(
        &mut body,
        "Average Pace",
        &or_dash(summary.average_pace.map(|pace| format!("{pace} min/km"))),
    );
    summary_card(
        &mut body,
        "Elevation (running)",
        &format!(
            "+{}m, -{}m",
            summary.elevation_running_gain_m, summary.elevation_running_loss_m
        ),
    );
    summary_card(
        &mut body,
        "Elevation (total)",
        &format!(
            "+{}m, -{}m",
            summary.elevation_total_gain_m, summary.elevation_total_loss_m
        ),
    );
    body.push_str("</div>");
    body.push_str("</section>");

    body.push_str("<section class=\"results-card\">");
    body.push_str(
        "<div class=\"results-header\"><div><p class=\"eyebrow\">Speed distribution</p><h2>Distance and time per speed range</h2></div></div>",
    );
    body.push_str("<div class=\"table-wrapper\"><table><thead><tr><th>km/h</th><th>Distance (km)</th><th>Time</th><th>Elevation</th></tr></thead><tbody>");
    for bucket in &report.speed_distribution {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>+{}m, -{}m</td></tr>",
            bucket.range,
            bucket.distance,
            bucket.time,
            bucket.elevation_gain_m,
            bucket.elevation_loss_m
        ));
    }
    body.push_str("</tbody></table></div>");
    body.push_str("</section>");

    body.push_str("<section class=\"results-card\">");
    body.push_str(&format!(
        "<div class=\"results-header\"><div><p class=\"eyebrow\">Splits</p><h2>{} splits</h2></div></div>",
        report.splits.len()
    ));
    body.push_str("<div class=\"table-wrapper\"><table><thead><tr><th>km</th><th>Length</th><th>Time</th><th>Total time</th><th>Pace</th><th>Speed</th><th>Avg speed</th><th>Elevation</th></tr></thead><tbody>");
    for split in &report.splits {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}m</td></tr>",
            split.total,
            split.length,
            split.time,
            split.cumulative_time,
            or_dash(split.pace),
            or_dash(split.speed.as_deref()),
            or_dash(split.cumulative_speed.as_deref()),
            split.elevation_m
        ));
    }
    body.push_str("</tbody></table></div>");
    body.push_str("</section>");
    body
}

/// Plain-text report, one fact per line.
pub fn render_text_report(report: &TrackReport) -> String {
    let metadata = &report.metadata;
    let summary = &report.summary;
    let mut out = String::new();

    out.push_str(&format!("# Generated by {}\n", metadata.generated_by));
    out.push_str(&format!("{}\n", metadata.raw_name));
    out.push_str(&format!("{}\n", metadata.start_date));
    out.push_str(&format!("Total distance is {} km\n", summary.distance));
    out.push_str(&format!(
        "Total running distance is {} km\n",
        summary.running_distance
    ));
    if let Some(share) = summary.running_share_percent {
        out.push_str(&format!(
            "Running(>={} km/h) in {share:.3}% of the path\n",
            report.options.running_speed_kmh
        ));
    }
    out.push_str(&format!("Running time {}\n", summary.running_time));
    out.push_str(&format!("Total time {}\n", summary.total_time));
    out.push_str(&format!("Rest time {}\n", summary.rest_time));
    out.push_str(&format!("Average speed: {} km/h\n", summary.average_speed));
    if let Some(pace) = summary.average_pace {
        out.push_str(&format!("Average pace: {pace} min/km\n"));
    }
    out.push_str(&format!(
        "Elevation running: +{}m, -{}m\n",
        summary.elevation_running_gain_m, summary.elevation_running_loss_m
    ));
    out.push_str(&format!(
        "Elevation total: +{}m, -{}m\n",
        summary.elevation_total_gain_m, summary.elevation_total_loss_m
    ));
    if let Some(link) = &metadata.activity_link {
        out.push_str(&format!("Activity: {link}\n"));
    }

    out.push_str("\nSpeed distribution (km/h):\n");
    for bucket in &report.speed_distribution {
        out.push_str(&format!(
            "{:>6} {:>8} km {} +{}m -{}m\n",
            bucket.range,
            bucket.distance,
            bucket.time,
            bucket.elevation_gain_m,
            bucket.elevation_loss_m
        ));
    }

    out.push_str("\nSplits:\n");
    for split in &report.splits {
        out.push_str(&format!(
            "{:>8} km {:>8} {} pace {} ({} km/h) {}m\n",
            split.total,
            split.time,
            split.cumulative_time,
            or_dash(split.pace),
            or_dash(split.speed.as_deref()),
            split.elevation_m
        ));
    }
    out
}
