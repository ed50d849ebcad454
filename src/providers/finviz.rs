use async_trait::async_trait;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;

use super::{parse_number, parse_volume, GainersProvider, ProviderContext, ProviderError};
use crate::models::{Candidate, Market};

const FINVIZ_GAINERS_URL: &str = "https://finviz.com/screener.ashx?v=111&s=ta_topgainers";
const MAX_ROWS: usize = 50;
const MIN_TABLE_ROWS: usize = 10;

/// Column positions in the screener table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    ticker: usize,
    name: usize,
    price: usize,
    change: usize,
    volume: usize,
}

impl Default for ColumnMap {
    /// Overview layout: No., Ticker, Company, Sector, Industry, Country,
    /// Market Cap, P/E, Price, Change, Volume.
    fn default() -> Self {
        Self {
            ticker: 1,
            name: 2,
            price: 8,
            change: 9,
            volume: 10,
        }
    }
}

impl ColumnMap {
    fn from_header(cells: &[String]) -> Self {
        let mut map = Self::default();
        let mut found = 0;
        for (idx, text) in cells.iter().enumerate() {
            let text = text.trim().to_lowercase();
            if text.contains("ticker") {
                map.ticker = idx;
                found += 1;
            } else if text.contains("company") {
                map.name = idx;
                found += 1;
            } else if text.starts_with("price") {
                map.price = idx;
                found += 1;
            } else if text.starts_with("change") {
                map.change = idx;
                found += 1;
            } else if text == "volume" || text == "vol" {
                map.volume = idx;
                found += 1;
            }
        }
        if found == 0 {
            tracing::debug!("Finviz: header not recognised, using default column layout");
        }
        map
    }

    fn max_index(&self) -> usize {
        [self.ticker, self.name, self.price, self.change, self.volume]
            .into_iter()
            .max()
            .unwrap_or(0)
    }
}

/// US top gainers scraped from the Finviz screener. Finviz does not publish
/// relative volume in this view, so `volume_ratio` is always unknown.
#[derive(Debug, Clone)]
pub struct FinvizGainers {
    ctx: ProviderContext,
    url: String,
}

impl FinvizGainers {
    pub fn new(ctx: ProviderContext) -> Self {
        Self {
            ctx,
            url: FINVIZ_GAINERS_URL.into(),
        }
    }
}

#[async_trait]
impl GainersProvider for FinvizGainers {
    fn id(&self) -> &'static str {
        "finviz"
    }

    async fn fetch_gainers(&self, market: Market) -> Result<Vec<Candidate>, ProviderError> {
        if market != Market::Us {
            return Ok(Vec::new());
        }
        let html = self.ctx.get_text(self.id(), &self.url).await?;
        self.ctx.parse_pool.run(move || parse_screener(&html)).await?
    }
}

fn selector(css: &str) -> Result<Selector, ProviderError> {
    Selector::parse(css).map_err(|e| ProviderError::Parse(format!("bad selector {css}: {e}")))
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Parse the screener page. Table discovery falls back from the screener
/// class, to the first large table, to every row in the document.
pub(crate) fn parse_screener(html: &str) -> Result<Vec<Candidate>, ProviderError> {
    let doc = Html::parse_document(html);
    let screener_sel = selector(r#"table[class*="screener_table"]"#)?;
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let header_sel = selector("th, td")?;
    let cell_sel = selector("td")?;
    let link_sel = selector("a")?;

    let rows: Vec<ElementRef<'_>> = if let Some(table) = doc.select(&screener_sel).next() {
        table.select(&row_sel).collect()
    } else if let Some(table) = doc
        .select(&table_sel)
        .find(|t| t.select(&row_sel).count() > MIN_TABLE_ROWS)
    {
        tracing::warn!("Finviz: screener table class missing, using first large table");
        table.select(&row_sel).collect()
    } else {
        let all: Vec<ElementRef<'_>> = doc.select(&row_sel).collect();
        if all.len() <= MIN_TABLE_ROWS {
            return Err(ProviderError::Parse("finviz: no screener table found".into()));
        }
        tracing::warn!(rows = all.len(), "Finviz: no table found, using all rows");
        all
    };

    let Some((header, data)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    let header_cells: Vec<String> = header.select(&header_sel).map(|c| cell_text(&c)).collect();
    let cols = ColumnMap::from_header(&header_cells);

    let mut out = Vec::new();
    for row in data.iter().take(MAX_ROWS) {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
        match parse_row(&cells, &cols, &link_sel) {
            Some(c) => out.push(c),
            None => tracing::debug!(cells = cells.len(), "Finviz: skipping unparseable row"),
        }
    }
    Ok(out)
}

fn parse_row(cells: &[ElementRef<'_>], cols: &ColumnMap, link_sel: &Selector) -> Option<Candidate> {
    if cells.len() <= cols.max_index() {
        return None;
    }

    let ticker_cell = &cells[cols.ticker];
    let ticker = ticker_cell
        .select(link_sel)
        .next()
        .map(|a| cell_text(&a))
        .unwrap_or_else(|| cell_text(ticker_cell));
    if ticker.is_empty() {
        return None;
    }

    let name = cell_text(&cells[cols.name]);
    let price = Decimal::from_str(&cell_text(&cells[cols.price]).replace(',', "")).ok()?;
    let change = parse_number(&cell_text(&cells[cols.change]))?;
    let volume = parse_volume(&cell_text(&cells[cols.volume])).unwrap_or(0);

    let display_name = if name.is_empty() { ticker.clone() } else { name };
    Some(
        Candidate::surge(ticker, display_name, Market::Us, "finviz")
            .with_move(price, change)
            .with_volume(volume, None),
    )
}
