use crate::config::{FilterRules, ScanThresholds};
use crate::models::{AlertKind, Candidate, NewsItem, SourceMode};

/// Why a candidate did not become a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ChangeBelowThreshold,
    VolumeRatioBelowThreshold,
    NoVolume,
    NetBuyBelowThreshold,
    ThemeBelowThreshold,
    NoThemeLeaders,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::ChangeBelowThreshold => "change_below_threshold",
            Rejection::VolumeRatioBelowThreshold => "volume_ratio_below_threshold",
            Rejection::NoVolume => "no_volume",
            Rejection::NetBuyBelowThreshold => "net_buy_below_threshold",
            Rejection::ThemeBelowThreshold => "theme_below_threshold",
            Rejection::NoThemeLeaders => "no_theme_leaders",
        }
    }
}

/// Apply the surge gates.
///
/// A known volume ratio must clear `min_volume_ratio`. An unknown ratio is
/// accepted as long as the provider reported non-zero raw volume.
pub fn check_candidate(candidate: &Candidate, thresholds: &ScanThresholds) -> Result<(), Rejection> {
    match candidate.kind {
        AlertKind::ProgramFlow => {
            if candidate.net_buy.unwrap_or(0) < thresholds.min_program_buy {
                return Err(Rejection::NetBuyBelowThreshold);
            }
            Ok(())
        }
        AlertKind::Theme => {
            let Some(theme) = &candidate.theme else {
                return Err(Rejection::NoThemeLeaders);
            };
            if !candidate.change_percent.is_finite()
                || candidate.change_percent < thresholds.min_theme_change_pct
                || theme.advancers < thresholds.min_theme_advancers
            {
                return Err(Rejection::ThemeBelowThreshold);
            }
            if theme.leaders.is_empty() {
                return Err(Rejection::NoThemeLeaders);
            }
            Ok(())
        }
        AlertKind::Surge => {
            if !candidate.change_percent.is_finite()
                || candidate.change_percent < thresholds.min_change_pct
            {
                return Err(Rejection::ChangeBelowThreshold);
            }
            match candidate.volume_ratio {
                Some(ratio) if ratio >= thresholds.min_volume_ratio => Ok(()),
                Some(_) => Err(Rejection::VolumeRatioBelowThreshold),
                None if candidate.volume > 0 => Ok(()),
                None => Err(Rejection::NoVolume),
            }
        }
    }
}

/// One-line reason carried on the signal.
pub fn signal_reason(candidate: &Candidate, mode: SourceMode) -> String {
    match candidate.kind {
        AlertKind::ProgramFlow => format!(
            "Program net buy {:.0}억 KRW",
            candidate.net_buy.unwrap_or(0) as f64 / 100.0
        ),
        AlertKind::Theme => {
            let Some(theme) = &candidate.theme else {
                return format!("Theme move ({:+.1}%)", candidate.change_percent);
            };
            let leaders = theme
                .leaders
                .iter()
                .map(|l| format!("{} {:+.1}%", l.name, l.change_percent))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "Theme {} {:+.1}%, {} advancers, led by {leaders}",
                theme.name, candidate.change_percent, theme.advancers
            )
        }
        AlertKind::Surge => {
            let volume = candidate
                .volume_ratio
                .map(|r| format!("{r:.1}x volume"))
                .unwrap_or_else(|| "high volume".into());
            match mode {
                SourceMode::Watchlist => format!(
                    "News ticker surge ({:.1}%, {volume})",
                    candidate.change_percent
                ),
                SourceMode::FullMarket => format!(
                    "{} gainer ({:.1}%, {volume})",
                    candidate.provider_id, candidate.change_percent
                ),
            }
        }
    }
}

/// Headline pre-filter run before spending a classifier call.
///
/// Negative keywords reject outright. Priority items pass without a positive
/// keyword; everything else needs one.
pub fn passes_keyword_filter(item: &NewsItem, rules: &FilterRules) -> bool {
    let title = item.title.to_uppercase();

    if rules.negative_keywords.iter().any(|k| title.contains(k.as_str())) {
        return false;
    }
    if item.is_priority {
        return true;
    }
    rules.positive_keywords.iter().any(|k| title.contains(k.as_str()))
}

/// Does the title carry a breaking/exclusive marker?
pub fn is_priority_headline(title: &str, rules: &FilterRules) -> bool {
    let upper = title.to_uppercase();
    rules
        .priority_markers
        .iter()
        .any(|m| upper.contains(&m.to_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Market, ThemeInfo, ThemeLeader};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn thresholds() -> ScanThresholds {
        ScanThresholds::default()
    }

    fn surge(change: f64, volume: u64, ratio: Option<f64>) -> Candidate {
        Candidate::surge("ABCD", "Abcd Inc", Market::Us, "finviz")
            .with_move(Decimal::from(3), change)
            .with_volume(volume, ratio)
    }

    fn news(title: &str) -> NewsItem {
        NewsItem {
            title: title.into(),
            url: "https://example.com/a".into(),
            source: "test".into(),
            market: Market::Us,
            published_at: Utc::now(),
            is_priority: false,
        }
    }

    #[test]
    fn test_surge_passes_with_known_ratio() {
        assert_eq!(check_candidate(&surge(12.0, 1_000, Some(6.0)), &thresholds()), Ok(()));
    }

    #[test]
    fn test_surge_rejections() {
        assert_eq!(
            check_candidate(&surge(9.9, 1_000, Some(6.0)), &thresholds()),
            Err(Rejection::ChangeBelowThreshold)
        );
        assert_eq!(
            check_candidate(&surge(12.0, 1_000, Some(4.0)), &thresholds()),
            Err(Rejection::VolumeRatioBelowThreshold)
        );
        assert_eq!(
            check_candidate(&surge(f64::NAN, 1_000, Some(6.0)), &thresholds()),
            Err(Rejection::ChangeBelowThreshold)
        );
    }

    #[test]
    fn test_unknown_ratio_is_not_zero() {
        assert_eq!(check_candidate(&surge(12.0, 250_000, None), &thresholds()), Ok(()));
        assert_eq!(
            check_candidate(&surge(12.0, 0, None), &thresholds()),
            Err(Rejection::NoVolume)
        );
    }

    #[test]
    fn test_program_flow_gate() {
        let mut c = surge(0.0, 0, None);
        c.kind = AlertKind::ProgramFlow;
        c.net_buy = Some(450);
        assert_eq!(check_candidate(&c, &thresholds()), Ok(()));
        c.net_buy = Some(120);
        assert_eq!(check_candidate(&c, &thresholds()), Err(Rejection::NetBuyBelowThreshold));
    }

    fn theme(change: f64, advancers: u32, leaders: usize) -> Candidate {
        let info = ThemeInfo {
            name: "2차전지".into(),
            advancers,
            leaders: (0..leaders)
                .map(|i| ThemeLeader {
                    code: format!("00{i}"),
                    name: format!("Leader{i}"),
                    price: Decimal::from(10_000),
                    change_percent: 9.0 - i as f64,
                })
                .collect(),
        };
        Candidate::theme(info, Market::Kr, change, "naver_theme")
    }

    #[test]
    fn test_theme_gate() {
        assert_eq!(check_candidate(&theme(3.5, 7, 3), &thresholds()), Ok(()));
        assert_eq!(
            check_candidate(&theme(2.9, 7, 3), &thresholds()),
            Err(Rejection::ThemeBelowThreshold)
        );
        assert_eq!(
            check_candidate(&theme(4.0, 4, 3), &thresholds()),
            Err(Rejection::ThemeBelowThreshold)
        );
        assert_eq!(
            check_candidate(&theme(4.0, 8, 0), &thresholds()),
            Err(Rejection::NoThemeLeaders)
        );
    }

    #[test]
    fn test_theme_reason_lists_leaders() {
        let reason = signal_reason(&theme(4.2, 6, 2), SourceMode::FullMarket);
        assert_eq!(reason, "Theme 2차전지 +4.2%, 6 advancers, led by Leader0 +9.0%, Leader1 +8.0%");
    }

    #[test]
    fn test_keyword_filter() {
        let rules = FilterRules::default();
        assert!(passes_keyword_filter(&news("Acme receives FDA approval for lead asset"), &rules));
        assert!(!passes_keyword_filter(&news("Acme announces FDA approval and public offering"), &rules));
        assert!(!passes_keyword_filter(&news("Acme to present at investor conference"), &rules));

        let mut breaking = news("Acme to present at investor conference");
        breaking.is_priority = true;
        assert!(passes_keyword_filter(&breaking, &rules));
    }

    #[test]
    fn test_priority_marker() {
        let rules = FilterRules::default();
        assert!(is_priority_headline("[속보] 삼성전자 대규모 수주", &rules));
        assert!(is_priority_headline("Breaking: Acme halts trading", &rules));
        assert!(!is_priority_headline("Acme quarterly results", &rules));
    }

    #[test]
    fn test_reason_mentions_unknown_volume() {
        let reason = signal_reason(&surge(12.0, 100, None), SourceMode::FullMarket);
        assert_eq!(reason, "finviz gainer (12.0%, high volume)");
    }
}
