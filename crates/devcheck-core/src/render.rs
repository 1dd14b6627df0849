use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Local;
use devcheck_shared::{ProjectStatus, User};
use unicode_width::UnicodeWidthStr;

use crate::aggregate::{ProjectOverview, StatusCounts, TaskTotals, detail_totals};
use crate::config::Config;
use crate::coordinator::Notice;
use crate::tree::ProjectTree;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, projects))]
    pub fn print_projects(&self, projects: &[&ProjectOverview]) -> anyhow::Result<()> {
        self.write_projects(io::stdout().lock(), projects)
    }

    pub fn write_projects<W: Write>(
        &self,
        mut out: W,
        projects: &[&ProjectOverview],
    ) -> anyhow::Result<()> {
        if projects.is_empty() {
            writeln!(out, "No projects yet.")?;
            return Ok(());
        }

        let headers = ["ID", "Name", "Status", "Tasks", "Progress", "Updated"]
            .into_iter()
            .map(str::to_string)
            .collect();

        let rows = projects
            .iter()
            .map(|overview| {
                let project = &overview.project;
                vec![
                    self.paint(&project.id.to_string(), "33"),
                    project.name.clone(),
                    self.paint_status(project.project_status),
                    tasks_cell(overview.totals, overview.detail.is_some()),
                    overview.totals.progress(),
                    project
                        .last_edited()
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M")
                        .to_string(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    #[tracing::instrument(skip(self, counts, totals))]
    pub fn print_summary(&self, counts: StatusCounts, totals: TaskTotals) -> anyhow::Result<()> {
        self.write_summary(io::stdout().lock(), counts, totals)
    }

    pub fn write_summary<W: Write>(
        &self,
        mut out: W,
        counts: StatusCounts,
        totals: TaskTotals,
    ) -> anyhow::Result<()> {
        for status in ProjectStatus::ALL {
            writeln!(
                out,
                "{}{}",
                pad_visible(&self.paint_status(status), 16),
                counts.get(status)
            )?;
        }
        writeln!(
            out,
            "tasks           {}/{} ({})",
            totals.completed,
            totals.total,
            totals.progress()
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, tree))]
    pub fn print_tree(&self, tree: &ProjectTree) -> anyhow::Result<()> {
        self.write_tree(io::stdout().lock(), tree)
    }

    pub fn write_tree<W: Write>(&self, mut out: W, tree: &ProjectTree) -> anyhow::Result<()> {
        let detail = tree.detail();
        let totals = detail_totals(detail);
        writeln!(out, "{} [{}]", detail.name, self.paint_status(detail.project_status))?;
        if let Some(description) = detail.description.as_deref().filter(|d| !d.is_empty()) {
            writeln!(out, "  {description}")?;
        }
        if let Some(link) = detail.link.as_deref().filter(|l| !l.is_empty()) {
            writeln!(out, "  {link}")?;
        }
        writeln!(
            out,
            "  {} ({})",
            tasks_cell(totals, true),
            totals.progress()
        )?;

        for page in tree.pages() {
            writeln!(out)?;
            let missing = tree.missing_stages(page.id);
            if missing.is_empty() {
                writeln!(out, "{} (page {})", page.name, page.id)?;
            } else {
                let stages: Vec<&str> = missing.iter().map(|s| s.code()).collect();
                let warning = format!("incomplete: missing {}", stages.join(", "));
                writeln!(
                    out,
                    "{} (page {}) {}",
                    page.name,
                    page.id,
                    self.paint(&warning, "31")
                )?;
            }

            for section in &page.sections {
                writeln!(out, "  {}", section.title.label())?;
                if section.tasks.is_empty() {
                    writeln!(out, "    (no tasks)")?;
                }
                for task in &section.tasks {
                    let mark = if task.completed { "[x]" } else { "[ ]" };
                    writeln!(out, "    {mark} {:>5}  {}", task.id.0, task.title)?;
                }
            }
        }
        Ok(())
    }

    pub fn print_user(&self, user: &User) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "id        {}", user.id)?;
        writeln!(out, "username  {}", user.username)?;
        if let Some(joined) = user.date_joined {
            writeln!(
                out,
                "joined    {}",
                joined.with_timezone(&Local).format("%Y-%m-%d")
            )?;
        }
        Ok(())
    }

    pub fn print_notices(&self, notices: &[Notice]) -> anyhow::Result<()> {
        let mut err = io::stderr().lock();
        for notice in notices {
            writeln!(err, "{}", self.paint(&notice.message, "31"))?;
        }
        Ok(())
    }

    fn paint_status(&self, status: ProjectStatus) -> String {
        let code = match status {
            ProjectStatus::Mvp => "32",
            ProjectStatus::InDevelopment => "33",
            ProjectStatus::InDeployment => "34",
        };
        self.paint(status.label(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn tasks_cell(totals: TaskTotals, known: bool) -> String {
    if !known {
        "-".to_string()
    } else if !totals.has_tasks() {
        "no tasks yet".to_string()
    } else {
        format!("{}/{}", totals.completed, totals.total)
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ", width = *width)?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            write!(writer, "{} ", pad_visible(cell, *width))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

/// Left-aligns `cell` to `width` terminal columns, ignoring color codes.
fn pad_visible(cell: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    format!("{cell}{}", " ".repeat(width.saturating_sub(visible_width)))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
