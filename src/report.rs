use anyhow::Result;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::analytics::{
    ModeShare, MonthlyPresence, PersonFilter, PersonSummary, Scope, mode_distribution,
    monthly_presence, participants, person_summary,
};
use crate::calendar::TodayStatus;
use crate::model::{AttendanceRecord, Participant, Slot, format_date};

pub fn output_path(data_dir: &Path, output: Option<PathBuf>, scope: Scope) -> PathBuf {
    output.unwrap_or_else(|| {
        let mut out = data_dir.join(match scope {
            Scope::ValidOnly => "relatorio_frequencia".to_string(),
            Scope::Year(year) => format!("relatorio_frequencia_{year}"),
        });
        out.set_extension("xlsx");
        out
    })
}

pub fn scope_label(scope: Scope) -> String {
    match scope {
        Scope::ValidOnly => "datas corretas".to_string(),
        Scope::Year(year) => format!("ano {year}"),
    }
}

pub fn render_today(status: &TodayStatus) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Hoje: {}", format_date(status.today));
    if status.is_meeting_day {
        let _ = writeln!(
            output,
            "Hoje é um dia de Momento Áureo! Registre abaixo as frequências."
        );
    } else {
        let _ = writeln!(output, "Lembrando que hoje não é um dia de Momento Áureo.");
    }
    if let Some(previous) = status.previous {
        let _ = writeln!(output, "Último encontro: {}", format_date(previous));
    }
    if let Some(next) = status.next {
        let _ = writeln!(output, "Próximo encontro: {}", format_date(next));
    }
    output
}

pub fn render_members(slot: Slot, members: &[&Participant]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Lançar Frequência - {}", slot.title());
    if members.is_empty() {
        let _ = writeln!(output, "Nenhum participante cadastrado neste momento.");
    }
    for participant in members {
        let _ = writeln!(output, "- {}", participant.name);
    }
    output
}

pub fn render_monthly(rows: &[MonthlyPresence], scope: Scope) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Frequência mensal ({})", scope_label(scope));
    if rows.is_empty() {
        let _ = writeln!(output, "Nenhum registro encontrado.");
        return output;
    }
    let _ = writeln!(
        output,
        "{:<8} {:>7} {:>9} {:>9} {:>10} {:>10}",
        "Mês", "Momento", "Registros", "Presentes", "% Presença", "% Ausência"
    );
    for row in rows {
        let _ = writeln!(
            output,
            "{:<8} {:>7} {:>9} {:>9} {:>10.1} {:>10.1}",
            row.month.to_string(),
            row.slot.number(),
            row.total,
            row.present,
            row.present_pct,
            row.absent_pct
        );
    }
    output
}

pub fn render_modes(shares: &[ModeShare], scope: Scope) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Tipo de presença ({})", scope_label(scope));
    if shares.is_empty() {
        let _ = writeln!(output, "Nenhum registro encontrado.");
    }
    for share in shares {
        let _ = writeln!(
            output,
            "- {}: {} registros ({:.2}%)",
            share.mode.label(),
            share.count,
            share.pct
        );
    }
    output
}

pub fn render_person(summary: &PersonSummary, filter: &PersonFilter) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# {}", summary.name);
    let period = match (filter.from, filter.to) {
        (None, None) => "todo o período".to_string(),
        (from, to) => format!(
            "{} a {}",
            from.map(format_date).unwrap_or_else(|| "início".to_string()),
            to.map(format_date).unwrap_or_else(|| "hoje".to_string())
        ),
    };
    let slot = filter
        .slot
        .map(|s| format!("{s}º momento"))
        .unwrap_or_else(|| "ambos os momentos".to_string());
    let _ = writeln!(output, "Período: {period}, {slot}");
    if summary.total == 0 {
        let _ = writeln!(output, "Nenhum registro encontrado.");
        return output;
    }
    let _ = writeln!(
        output,
        "Presença: {:.2}% ({} de {}), ausência: {:.2}%",
        summary.present_pct, summary.present, summary.total, summary.absent_pct
    );
    let _ = writeln!(
        output,
        "Presencial: {:.2}% ({}), online: {:.2}% ({})",
        summary.on_site_pct, summary.on_site, summary.remote_pct, summary.remote
    );
    for month in &summary.months {
        let _ = writeln!(
            output,
            "- {}: {:.2}% ({} de {})",
            month.month, month.present_pct, month.present, month.total
        );
    }
    output
}

struct ReportFormats {
    title: Format,
    header: Format,
    cell: Format,
    percent: Format,
}

impl ReportFormats {
    fn new() -> Self {
        Self {
            title: Format::new()
                .set_bold()
                .set_font_size(16)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            header: Format::new()
                .set_bold()
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_text_wrap(),
            cell: Format::new()
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            percent: Format::new()
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center)
                .set_num_format("0.00"),
        }
    }
}

fn write_sheet_header(
    ws: &mut Worksheet,
    title: &str,
    headers: &[&str],
    fmt: &ReportFormats,
) -> Result<u32> {
    let last_col = headers.len().saturating_sub(1) as u16;
    ws.set_row_height(0, 28)?;
    ws.merge_range(0, 0, 0, last_col, title, &fmt.title)?;
    for (i, h) in headers.iter().enumerate() {
        ws.write_string_with_format(1, i as u16, *h, &fmt.header)?;
    }
    Ok(2)
}

fn merge_or_write_str(
    ws: &mut Worksheet,
    start: u32,
    end: u32,
    col: u16,
    val: &str,
    fmt: &Format,
) -> Result<()> {
    if end > start {
        ws.merge_range(start, col, end, col, val, fmt)?;
    } else {
        ws.write_string_with_format(start, col, val, fmt)?;
    }
    Ok(())
}

fn set_column_widths(ws: &mut Worksheet, widths: &[u16]) -> Result<()> {
    for (col, w) in widths.iter().enumerate() {
        ws.set_column_width(col as u16, *w)?;
    }
    Ok(())
}

fn write_monthly_sheet(
    ws: &mut Worksheet,
    title: &str,
    rows: &[MonthlyPresence],
    fmt: &ReportFormats,
) -> Result<()> {
    ws.set_name("Mensal")?;
    let headers = ["Mês", "Momento", "Registros", "Presentes", "% Presença", "% Ausência"];
    let mut row = write_sheet_header(ws, title, &headers, fmt)?;

    // One merged month cell spanning both slots of that month.
    let mut month_start = row;
    for (i, m) in rows.iter().enumerate() {
        ws.write_number_with_format(row, 1, f64::from(m.slot.number()), &fmt.cell)?;
        ws.write_number_with_format(row, 2, m.total as f64, &fmt.cell)?;
        ws.write_number_with_format(row, 3, m.present as f64, &fmt.cell)?;
        ws.write_number_with_format(row, 4, m.present_pct, &fmt.percent)?;
        ws.write_number_with_format(row, 5, m.absent_pct, &fmt.percent)?;
        let month_ends = rows.get(i + 1).is_none_or(|next| next.month != m.month);
        if month_ends {
            merge_or_write_str(ws, month_start, row, 0, &m.month.to_string(), &fmt.cell)?;
            month_start = row + 1;
        }
        row += 1;
    }
    set_column_widths(ws, &[10, 10, 11, 11, 12, 12])
}

fn write_modes_sheet(
    ws: &mut Worksheet,
    title: &str,
    shares: &[ModeShare],
    fmt: &ReportFormats,
) -> Result<()> {
    ws.set_name("Tipo de presença")?;
    let mut row = write_sheet_header(ws, title, &["Tipo de presença", "Registros", "%"], fmt)?;
    for share in shares {
        ws.write_string_with_format(row, 0, share.mode.label(), &fmt.cell)?;
        ws.write_number_with_format(row, 1, share.count as f64, &fmt.cell)?;
        ws.write_number_with_format(row, 2, share.pct, &fmt.percent)?;
        row += 1;
    }
    set_column_widths(ws, &[18, 11, 10])
}

fn write_people_sheet(
    ws: &mut Worksheet,
    title: &str,
    people: &[PersonSummary],
    fmt: &ReportFormats,
) -> Result<()> {
    ws.set_name("Por pessoa")?;
    let headers = [
        "Nome",
        "Registros",
        "Presentes",
        "Presencial",
        "Online",
        "% Presença",
    ];
    let mut row = write_sheet_header(ws, title, &headers, fmt)?;
    for p in people {
        ws.write_string_with_format(row, 0, &p.name, &fmt.cell)?;
        ws.write_number_with_format(row, 1, p.total as f64, &fmt.cell)?;
        ws.write_number_with_format(row, 2, p.present as f64, &fmt.cell)?;
        ws.write_number_with_format(row, 3, p.on_site as f64, &fmt.cell)?;
        ws.write_number_with_format(row, 4, p.remote as f64, &fmt.cell)?;
        ws.write_number_with_format(row, 5, p.present_pct, &fmt.percent)?;
        row += 1;
    }
    set_column_widths(ws, &[24, 11, 11, 11, 11, 12])
}

/// Writes the monthly, presence type and per person aggregates of `records`
/// to an `.xlsx` workbook.
pub fn export_workbook(path: &Path, records: &[AttendanceRecord], scope: Scope) -> Result<()> {
    let title = format!("Frequência do Momento Áureo ({})", scope_label(scope));
    let monthly = monthly_presence(records, scope);
    let shares = mode_distribution(records, scope);
    let people: Vec<_> = participants(records)
        .iter()
        .map(|name| person_summary(records, name, scope, &PersonFilter::default()))
        .filter(|p| p.total > 0)
        .collect();

    let mut workbook = Workbook::new();
    let fmt = ReportFormats::new();
    write_monthly_sheet(workbook.add_worksheet(), &title, &monthly, &fmt)?;
    write_modes_sheet(workbook.add_worksheet(), &title, &shares, &fmt)?;
    write_people_sheet(workbook.add_worksheet(), &title, &people, &fmt)?;
    workbook.save(path)?;
    log::info!(
        "exported {} monthly rows and {} people to {}",
        monthly.len(),
        people.len(),
        path.display()
    );
    Ok(())
}
