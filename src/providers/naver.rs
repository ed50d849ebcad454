use async_trait::async_trait;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;

use super::{parse_number, parse_volume, GainersProvider, ProviderContext, ProviderError};
use crate::config::ScanThresholds;
use crate::models::{AlertKind, Candidate, Market, ThemeInfo, ThemeLeader};

const SURGE_URL: &str = "https://finance.naver.com/sise/sise_quant.naver";
const PROGRAM_URL: &str = "https://finance.naver.com/sise/programDeal.naver";
const THEME_URL: &str = "https://finance.naver.com/sise/theme.naver";
const NAVER_BASE: &str = "https://finance.naver.com";

const SURGE_ROWS: std::ops::Range<usize> = 2..52;
const PROGRAM_ROWS: std::ops::Range<usize> = 2..32;
const THEME_ROWS: std::ops::Range<usize> = 2..22;
const THEME_MEMBER_ROWS: std::ops::Range<usize> = 2..20;
const THEME_LEADERS: usize = 3;
/// Detail pages fetched per scan, hottest themes first.
const THEME_DETAIL_LIMIT: usize = 5;

fn selector(css: &str) -> Result<Selector, ProviderError> {
    Selector::parse(css).map_err(|e| ProviderError::Parse(format!("bad selector {css}: {e}")))
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// `(code, name)` from the stock link in a cell: `<a href="...?code=005930">`.
fn stock_link(cell: &ElementRef<'_>, link_sel: &Selector) -> Option<(String, String)> {
    let a = cell.select(link_sel).next()?;
    let href = a.value().attr("href")?;
    let code = href.split("code=").nth(1)?.split('&').next()?.trim();
    if code.is_empty() {
        return None;
    }
    Some((code.to_string(), cell_text(&a)))
}

/// Data rows of the first table matching `table_css`, limited to `range`
/// (the page carries two header/separator rows before the data).
fn table_rows<'a>(
    doc: &'a Html,
    table_css: &str,
    range: std::ops::Range<usize>,
) -> Result<Vec<ElementRef<'a>>, ProviderError> {
    let table_sel = selector(table_css)?;
    let row_sel = selector("tr")?;
    let table = doc
        .select(&table_sel)
        .next()
        .ok_or_else(|| ProviderError::Parse(format!("naver: {table_css} not found")))?;
    Ok(table
        .select(&row_sel)
        .skip(range.start)
        .take(range.end - range.start)
        .collect())
}

// ---------------------------------------------------------------------------
// Volume surge
// ---------------------------------------------------------------------------

/// KR volume-surge ranking. The page reports volume as a percentage of the
/// previous session, so `ratio = pct / 100 + 1`.
#[derive(Debug, Clone)]
pub struct NaverSurge {
    ctx: ProviderContext,
}

impl NaverSurge {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl GainersProvider for NaverSurge {
    fn id(&self) -> &'static str {
        "naver_surge"
    }

    async fn fetch_gainers(&self, market: Market) -> Result<Vec<Candidate>, ProviderError> {
        if market != Market::Kr {
            return Ok(Vec::new());
        }
        let html = self.ctx.get_text(self.id(), SURGE_URL).await?;
        self.ctx.parse_pool.run(move || parse_surge(&html)).await?
    }
}

pub(crate) fn parse_surge(html: &str) -> Result<Vec<Candidate>, ProviderError> {
    let doc = Html::parse_document(html);
    let cell_sel = selector("td")?;
    let link_sel = selector("a")?;

    let mut out = Vec::new();
    for row in table_rows(&doc, "table.type_2", SURGE_ROWS)? {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
        if cells.len() < 11 {
            continue;
        }
        match parse_surge_row(&cells, &link_sel) {
            Some(c) => out.push(c),
            None => tracing::debug!(cells = cells.len(), "Naver surge: skipping unparseable row"),
        }
    }
    Ok(out)
}

fn parse_surge_row(cells: &[ElementRef<'_>], link_sel: &Selector) -> Option<Candidate> {
    let (code, name) = stock_link(&cells[1], link_sel)?;
    let price = Decimal::from_str(&cell_text(&cells[2]).replace(',', "")).ok()?;
    let change = parse_number(&cell_text(&cells[4]))?;
    let volume = parse_volume(&cell_text(&cells[6])).unwrap_or(0);
    let ratio = parse_number(&cell_text(&cells[10])).map(|pct| pct / 100.0 + 1.0);

    Some(
        Candidate::surge(code, name, Market::Kr, "naver_surge")
            .with_move(price, change)
            .with_volume(volume, ratio),
    )
}

// ---------------------------------------------------------------------------
// Program trading
// ---------------------------------------------------------------------------

/// KR program-trading net buy ranking. Produces `ProgramFlow` candidates,
/// net buy in millions of KRW.
#[derive(Debug, Clone)]
pub struct NaverProgramFlow {
    ctx: ProviderContext,
}

impl NaverProgramFlow {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl GainersProvider for NaverProgramFlow {
    fn id(&self) -> &'static str {
        "naver_program"
    }

    async fn fetch_gainers(&self, market: Market) -> Result<Vec<Candidate>, ProviderError> {
        if market != Market::Kr {
            return Ok(Vec::new());
        }
        let html = self.ctx.get_text(self.id(), PROGRAM_URL).await?;
        self.ctx.parse_pool.run(move || parse_program(&html)).await?
    }
}

pub(crate) fn parse_program(html: &str) -> Result<Vec<Candidate>, ProviderError> {
    let doc = Html::parse_document(html);
    let cell_sel = selector("td")?;
    let link_sel = selector("a")?;

    let mut out = Vec::new();
    for row in table_rows(&doc, "table.type_1", PROGRAM_ROWS)? {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
        if cells.len() < 7 {
            continue;
        }
        let Some((code, name)) = stock_link(&cells[0], &link_sel) else {
            continue;
        };
        let Some(net_buy) = parse_number(&cell_text(&cells[5])) else {
            tracing::debug!(code = %code, "Naver program: unparseable net buy");
            continue;
        };

        let mut c = Candidate::surge(code, name, Market::Kr, "naver_program");
        c.kind = AlertKind::ProgramFlow;
        c.net_buy = Some(net_buy.round() as i64);
        out.push(c);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Themes
// ---------------------------------------------------------------------------

/// One row of the theme ranking.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ThemeRow {
    pub name: String,
    pub detail_path: String,
    pub change_percent: f64,
    pub advancers: u32,
}

/// KR theme ranking. For each theme clearing the change and advancer floors,
/// the detail page is fetched for its top three gainers. Produces `Theme`
/// candidates.
#[derive(Debug, Clone)]
pub struct NaverTheme {
    ctx: ProviderContext,
    min_change_pct: f64,
    min_advancers: u32,
}

impl NaverTheme {
    pub fn new(ctx: ProviderContext, thresholds: &ScanThresholds) -> Self {
        Self {
            ctx,
            min_change_pct: thresholds.min_theme_change_pct,
            min_advancers: thresholds.min_theme_advancers,
        }
    }

    async fn leaders(&self, row: &ThemeRow) -> Result<Vec<ThemeLeader>, ProviderError> {
        self.ctx.shaper.pause().await;
        let url = format!("{NAVER_BASE}{}", row.detail_path);
        let html = self.ctx.get_text(self.id(), &url).await?;
        self.ctx.parse_pool.run(move || parse_theme_members(&html)).await?
    }
}

#[async_trait]
impl GainersProvider for NaverTheme {
    fn id(&self) -> &'static str {
        "naver_theme"
    }

    async fn fetch_gainers(&self, market: Market) -> Result<Vec<Candidate>, ProviderError> {
        if market != Market::Kr {
            return Ok(Vec::new());
        }
        let html = self.ctx.get_text(self.id(), THEME_URL).await?;
        let mut rows = self.ctx.parse_pool.run(move || parse_themes(&html)).await??;
        rows.retain(|r| r.change_percent >= self.min_change_pct && r.advancers >= self.min_advancers);
        rows.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent));
        rows.truncate(THEME_DETAIL_LIMIT);

        let mut out = Vec::new();
        for row in rows {
            let leaders = match self.leaders(&row).await {
                Ok(l) if !l.is_empty() => l,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(theme = %row.name, error = %e, "Naver theme: detail page failed, skipping theme");
                    continue;
                }
            };
            let info = ThemeInfo {
                name: row.name,
                advancers: row.advancers,
                leaders,
            };
            out.push(Candidate::theme(info, Market::Kr, row.change_percent, self.id()));
        }
        Ok(out)
    }
}

pub(crate) fn parse_themes(html: &str) -> Result<Vec<ThemeRow>, ProviderError> {
    let doc = Html::parse_document(html);
    let cell_sel = selector("td")?;
    let link_sel = selector("a")?;

    let mut out = Vec::new();
    for row in table_rows(&doc, "table.type_1", THEME_ROWS)? {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
        if cells.len() < 4 {
            continue;
        }
        let Some(link) = cells[0].select(&link_sel).next() else {
            continue;
        };
        let Some(detail_path) = link.value().attr("href").map(str::to_string) else {
            continue;
        };
        let Some(change_percent) = parse_number(&cell_text(&cells[2])) else {
            tracing::debug!("Naver theme: unparseable change");
            continue;
        };
        // "up/flat/down" counts; only the first matters.
        let advancers = cell_text(&cells[3])
            .split('/')
            .next()
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(0);

        out.push(ThemeRow {
            name: cell_text(&link),
            detail_path,
            change_percent,
            advancers,
        });
    }
    Ok(out)
}

/// Members of one theme that are up, best first, at most three.
pub(crate) fn parse_theme_members(html: &str) -> Result<Vec<ThemeLeader>, ProviderError> {
    let doc = Html::parse_document(html);
    let cell_sel = selector("td")?;
    let link_sel = selector("a")?;

    let mut members = Vec::new();
    for row in table_rows(&doc, "table.type_5", THEME_MEMBER_ROWS)? {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
        if cells.len() < 5 {
            continue;
        }
        let Some((code, name)) = stock_link(&cells[0], &link_sel) else {
            continue;
        };
        let price = Decimal::from_str(&cell_text(&cells[1]).replace(',', "")).unwrap_or(Decimal::ZERO);
        let change_percent = parse_number(&cell_text(&cells[3])).unwrap_or(0.0);
        if change_percent <= 0.0 {
            continue;
        }
        members.push(ThemeLeader {
            code,
            name,
            price,
            change_percent,
        });
    }

    members.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent));
    members.truncate(THEME_LEADERS);
    Ok(members)
}
