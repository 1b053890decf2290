//! Thai-language response guidance derived from scored regions.

use super::risk::{RiskLevel, ScoredRegion};

pub(crate) const NO_OVERLAP: &str = "ไม่พบพื้นที่ทับซ้อนของเหตุการณ์ที่เลือก";

/// Regions described individually; the rest are summarised in one line.
const MAX_REGION_NOTES: usize = 5;

/// Builds the ordered recommendation list: an overall assessment, then one
/// line per region in display order, then repeat-occurrence notes.
pub fn recommendations(scored: &[ScoredRegion], risk_score: u8, repeat_window_days: i64) -> Vec<String> {
    if scored.is_empty() {
        return vec![NO_OVERLAP.to_string()];
    }

    let mut lines = vec![overall_note(risk_score).to_string()];

    for (n, s) in scored.iter().enumerate().take(MAX_REGION_NOTES) {
        lines.push(format!(
            "พื้นที่ {}: เหตุการณ์ทับซ้อน {} เหตุการณ์ ครอบคลุม {:.2} ตร.กม. {}",
            n + 1,
            s.region.members.len(),
            s.region.area_km2,
            level_action(s.level)
        ));
    }
    if scored.len() > MAX_REGION_NOTES {
        lines.push(format!(
            "และอีก {} พื้นที่ทับซ้อน ดูรายละเอียดเพิ่มเติมบนแผนที่",
            scored.len() - MAX_REGION_NOTES
        ));
    }

    for (n, s) in scored.iter().enumerate().take(MAX_REGION_NOTES) {
        if s.span_days <= repeat_window_days {
            lines.push(format!(
                "พื้นที่ {}: เกิดเหตุซ้ำภายใน {} วัน ควรตรวจสอบสาเหตุร่วมของภัยและเตรียมมาตรการป้องกันล่วงหน้า",
                n + 1,
                s.span_days.max(1)
            ));
        }
    }

    lines
}

fn overall_note(risk_score: u8) -> &'static str {
    match risk_score {
        75..=u8::MAX => "ภาพรวมความเสี่ยงสูงมาก ควรประสานหน่วยงานระดับอำเภอเพื่อสนับสนุนกำลังและทรัพยากร",
        50..=74 => "ภาพรวมความเสี่ยงสูง ควรจัดลำดับความช่วยเหลือให้พื้นที่ทับซ้อนก่อน",
        _ => "ภาพรวมความเสี่ยงอยู่ในระดับควบคุมได้ ควรเฝ้าระวังพื้นที่ทับซ้อนตามปกติ",
    }
}

fn level_action(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Critical => "ความเสี่ยงวิกฤต ควรจัดกำลังเฝ้าระวังและเตรียมแผนอพยพเป็นลำดับแรก",
        RiskLevel::High => "ความเสี่ยงสูง ควรเพิ่มการลงพื้นที่และวางแผนป้องกันภัยซ้ำ",
        RiskLevel::Medium => "ความเสี่ยงปานกลาง ควรติดตามสถานการณ์อย่างใกล้ชิด",
        RiskLevel::Low => "ความเสี่ยงต่ำ ควรบันทึกไว้เพื่อติดตามแนวโน้ม",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate::OverlapRegion;
    use crate::analysis::Priority;
    use geo::polygon;

    fn scored(level: RiskLevel, members: usize, span_days: i64) -> ScoredRegion {
        ScoredRegion {
            region: OverlapRegion {
                members: (0..members).collect(),
                polygon: polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)],
                area_km2: 0.5,
            },
            level,
            max_priority: Priority::Medium,
            span_days,
        }
    }

    #[test]
    fn empty_input_has_single_message() {
        assert_eq!(recommendations(&[], 0, 30), vec![NO_OVERLAP.to_string()]);
    }

    #[test]
    fn region_lines_follow_overall_note() {
        let lines = recommendations(&[scored(RiskLevel::Critical, 4, 400)], 80, 30);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ภาพรวมความเสี่ยงสูงมาก"));
        assert!(lines[1].starts_with("พื้นที่ 1: เหตุการณ์ทับซ้อน 4 เหตุการณ์"));
        assert!(lines[1].contains("0.50 ตร.กม."));
        assert!(lines[1].contains("ความเสี่ยงวิกฤต"));
    }

    #[test]
    fn repeat_within_window_is_noted() {
        let lines = recommendations(&[scored(RiskLevel::Medium, 2, 5)], 30, 30);
        assert!(lines.iter().any(|l| l.contains("เกิดเหตุซ้ำภายใน 5 วัน")));

        let lines = recommendations(&[scored(RiskLevel::Medium, 2, 45)], 30, 30);
        assert!(!lines.iter().any(|l| l.contains("เกิดเหตุซ้ำ")));
    }

    #[test]
    fn long_lists_are_summarised() {
        let regions: Vec<ScoredRegion> = (0..7).map(|_| scored(RiskLevel::Low, 2, 365)).collect();
        let lines = recommendations(&regions, 40, 30);

        assert_eq!(lines.len(), 1 + MAX_REGION_NOTES + 1);
        assert!(lines.last().is_some_and(|l| l.starts_with("และอีก 2 พื้นที่")));
    }
}
