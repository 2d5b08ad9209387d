//! Static DOM audits. These are documented approximations of the Lighthouse
//! category audits: each starts from a fixed baseline and subtracts capped
//! penalties for the checks a flattened [`DomSummary`] can answer.

use crate::bridge::DomSummary;

const NODE_COUNT_BUDGET: usize = 1_500;

fn clamp_score(score: i64) -> u8 {
    score.clamp(0, 100) as u8
}

fn capped(per_item: i64, count: usize, cap: i64) -> i64 {
    (per_item * count as i64).min(cap)
}

/// Images without alt text and form controls without labels.
pub fn accessibility_score(dom: &DomSummary) -> u8 {
    let mut score: i64 = 95;

    let missing_alt = dom.images.iter().filter(|i| !i.has_alt).count();
    score -= capped(3, missing_alt, 30);

    let unlabeled = dom.controls.iter().filter(|c| !c.has_label).count();
    score -= capped(5, unlabeled, 25);

    clamp_score(score)
}

/// Transport security, console noise, doctype, image sizing, DOM size.
pub fn best_practices_score(dom: &DomSummary) -> u8 {
    let mut score: i64 = 95;

    if !dom.https {
        score -= 20;
    }
    if dom.console_error_count > 0 {
        score -= 10;
    }
    if !dom.has_doctype {
        score -= 10;
    }

    let unsized_images = dom.images.iter().filter(|i| !i.has_dimensions).count();
    score -= capped(2, unsized_images, 10);

    if dom.node_count > NODE_COUNT_BUDGET {
        score -= 5;
    }

    clamp_score(score)
}

/// Title and meta description presence, link text, viewport meta.
pub fn seo_score(dom: &DomSummary) -> u8 {
    let mut score: i64 = 90;

    match &dom.title {
        None => score -= 15,
        Some(title) if title.trim().is_empty() => score -= 5,
        Some(_) => {}
    }

    let described = dom.meta_description.as_ref().is_some_and(|d| !d.trim().is_empty());
    if !described {
        score -= 10;
    }

    let empty_links = dom.links.iter().filter(|l| l.text.trim().is_empty()).count();
    score -= capped(2, empty_links, 10);

    if !dom.has_viewport_meta {
        score -= 5;
    }

    clamp_score(score)
}
