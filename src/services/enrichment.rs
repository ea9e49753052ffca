use futures::{StreamExt, stream};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::Course;
use crate::youtube::VideoSearch;

/// Rotated into lessons that still have no video after search.
pub const DEFAULT_VIDEO_IDS: &[&str] = &[
    "zOjov-2OZ0E",
    "rfscVS0vtbw",
    "PkZNo7MFNFg",
    "pQN-pnXPaVg",
    "8jLOx1hD3_o",
    "HXV3zeQKqGY",
];

const MAX_SEARCHES_IN_FLIGHT: usize = 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrichmentStats {
    pub searched: usize,
    pub found: usize,
    pub defaulted: usize,
}

/// Gives every lesson a video id: search hits first, then the rotating defaults.
pub async fn enrich_course(course: &mut Course, search: &dyn VideoSearch) -> EnrichmentStats {
    let mut stats = EnrichmentStats::default();

    if search.is_configured() {
        let pending: Vec<(usize, usize, String)> = course
            .modules
            .iter()
            .enumerate()
            .flat_map(|(m, module)| {
                module
                    .lessons
                    .iter()
                    .enumerate()
                    .filter(|(_, lesson)| lesson.video_id.is_none())
                    .map(move |(l, lesson)| (m, l, lesson.title.clone()))
            })
            .map(|(m, l, title)| (m, l, format!("{} {}", course.topic, title)))
            .collect();

        stats.searched = pending.len();

        let results: Vec<(usize, usize, Result<Option<String>, AppError>)> = stream::iter(pending)
            .map(|(m, l, query)| async move {
                let result = search.search_video(&query).await;
                (m, l, result)
            })
            .buffered(MAX_SEARCHES_IN_FLIGHT)
            .collect()
            .await;

        for (m, l, result) in results {
            match result {
                Ok(Some(video_id)) => {
                    if let Some(lesson) = course.modules[m].lessons.get_mut(l) {
                        lesson.video_id = Some(video_id);
                        stats.found += 1;
                    }
                }
                Ok(None) => debug!("no video found for lesson {}/{}", m, l),
                Err(AppError::QuotaExceeded(msg)) => debug!("video search skipped: {}", msg),
                Err(e) => warn!("video search failed for lesson {}/{}: {}", m, l, e),
            }
        }
    }

    stats.defaulted = fill_default_videos(course);

    info!(
        "enriched course {:?}: searched {}, found {}, defaulted {}",
        course.title, stats.searched, stats.found, stats.defaulted
    );
    stats
}

/// Fills remaining gaps from [`DEFAULT_VIDEO_IDS`] in rotation; returns how many were filled.
pub fn fill_default_videos(course: &mut Course) -> usize {
    let mut filled = 0;
    for lesson in course.modules.iter_mut().flat_map(|m| m.lessons.iter_mut()) {
        if lesson.video_id.is_none() {
            lesson.video_id = Some(DEFAULT_VIDEO_IDS[filled % DEFAULT_VIDEO_IDS.len()].to_string());
            filled += 1;
        }
    }
    filled
}
