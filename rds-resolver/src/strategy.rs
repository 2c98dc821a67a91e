//! The resolver's two Overpass query strategies (spec §4.17, Design Note
//! §9), modeled as a closed enum rather than dynamic dispatch — the
//! strategy cache becomes a plain `Option<StrategyId>` per country.

use std::collections::HashMap;

use crate::overpass::OverpassElement;

/// Fields a strategy can recover for one LCD, prior to being wrapped in a
/// [`crate::ResolvedLocation`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFields {
    pub lat: f64,
    pub lon: f64,
    pub name: Option<String>,
    pub road_ref: Option<String>,
    pub prev_lcd: Option<u32>,
    pub next_lcd: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StrategyId {
    /// Query nodes carrying `TMC:cid_{cid}:tabcd_{tabcd}:LocationCode` tags.
    NodeTag,
    /// Query `type=tmc:point` relations keyed by a `table={cid}:{tabcd}` tag.
    Relation,
}

impl StrategyId {
    pub const ALL: [StrategyId; 2] = [StrategyId::NodeTag, StrategyId::Relation];

    pub fn build_query(self, batch: &[u32], cid: u16, tabcd: u16) -> String {
        match self {
            StrategyId::NodeTag => build_node_tag_query(batch, cid, tabcd),
            StrategyId::Relation => build_relation_query(batch, cid, tabcd),
        }
    }

    pub fn parse(self, elements: &[OverpassElement], cid: u16, tabcd: u16) -> HashMap<u32, ResolvedFields> {
        match self {
            StrategyId::NodeTag => parse_node_tag(elements, cid, tabcd),
            StrategyId::Relation => parse_relation(elements, cid, tabcd),
        }
    }
}

fn lcd_alternation(batch: &[u32]) -> String {
    batch.iter().map(|lcd| lcd.to_string()).collect::<Vec<_>>().join("|")
}

fn build_node_tag_query(batch: &[u32], cid: u16, tabcd: u16) -> String {
    let key = format!("TMC:cid_{cid}:tabcd_{tabcd}:LocationCode");
    let alt = lcd_alternation(batch);
    format!(
        "[out:json][timeout:25];node[\"{key}\"~\"^({alt})$\"];out body;"
    )
}

fn build_relation_query(batch: &[u32], cid: u16, tabcd: u16) -> String {
    let alt = lcd_alternation(batch);
    format!(
        "[out:json][timeout:25];relation[\"type\"=\"tmc:point\"][\"table\"=\"{cid}:{tabcd}\"][\"lcd\"~\"^({alt})$\"];out center;"
    )
}

fn parse_node_tag(elements: &[OverpassElement], cid: u16, tabcd: u16) -> HashMap<u32, ResolvedFields> {
    let lcd_key = format!("TMC:cid_{cid}:tabcd_{tabcd}:LocationCode");
    let prev_key = format!("TMC:cid_{cid}:tabcd_{tabcd}:PrevLocationCode");
    let next_key = format!("TMC:cid_{cid}:tabcd_{tabcd}:NextLocationCode");

    let mut out = HashMap::new();
    for el in elements {
        let (Some(lat), Some(lon)) = (el.lat, el.lon) else {
            continue;
        };
        let Some(lcd) = el.tags.get(&lcd_key).and_then(|v| v.parse::<u32>().ok()) else {
            continue;
        };
        out.insert(
            lcd,
            ResolvedFields {
                lat,
                lon,
                name: el.tags.get("name").cloned(),
                road_ref: el.tags.get("ref").cloned(),
                prev_lcd: el.tags.get(&prev_key).and_then(|v| v.parse().ok()),
                next_lcd: el.tags.get(&next_key).and_then(|v| v.parse().ok()),
            },
        );
    }
    out
}

fn parse_relation(elements: &[OverpassElement], _cid: u16, _tabcd: u16) -> HashMap<u32, ResolvedFields> {
    let mut out = HashMap::new();
    for el in elements {
        let Some(center) = el.center.as_ref() else {
            continue;
        };
        let Some(lcd) = el.tags.get("lcd").and_then(|v| v.parse::<u32>().ok()) else {
            continue;
        };
        out.insert(
            lcd,
            ResolvedFields {
                lat: center.lat,
                lon: center.lon,
                name: el.tags.get("name").cloned(),
                road_ref: el.tags.get("ref").cloned(),
                prev_lcd: el.tags.get("prev_lcd").and_then(|v| v.parse().ok()),
                next_lcd: el.tags.get("next_lcd").and_then(|v| v.parse().ok()),
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overpass::OverpassCenter;
    use std::collections::HashMap as Map;

    #[test]
    fn node_tag_query_embeds_cid_tabcd_and_lcd_alternation() {
        let query = StrategyId::NodeTag.build_query(&[1, 2, 9999], 58, 1);
        assert!(query.contains("TMC:cid_58:tabcd_1:LocationCode"));
        assert!(query.contains("^(1|2|9999)$"));
    }

    #[test]
    fn node_tag_parse_recovers_lat_lon_and_linkage() {
        let mut tags = Map::new();
        tags.insert("TMC:cid_58:tabcd_1:LocationCode".to_string(), "100".to_string());
        tags.insert("TMC:cid_58:tabcd_1:PrevLocationCode".to_string(), "99".to_string());
        tags.insert("name".to_string(), "Junction 4".to_string());

        let elements = vec![OverpassElement {
            kind: "node".to_string(),
            id: 1,
            lat: Some(51.5),
            lon: Some(-0.1),
            center: None,
            tags,
        }];

        let parsed = StrategyId::NodeTag.parse(&elements, 58, 1);
        let fields = parsed.get(&100).expect("lcd 100 present");
        assert_eq!(fields.lat, 51.5);
        assert_eq!(fields.name.as_deref(), Some("Junction 4"));
        assert_eq!(fields.prev_lcd, Some(99));
    }

    #[test]
    fn relation_parse_uses_center_coordinates() {
        let mut tags = Map::new();
        tags.insert("lcd".to_string(), "200".to_string());

        let elements = vec![OverpassElement {
            kind: "relation".to_string(),
            id: 2,
            lat: None,
            lon: None,
            center: Some(OverpassCenter { lat: 48.0, lon: 2.0 }),
            tags,
        }];

        let parsed = StrategyId::Relation.parse(&elements, 58, 1);
        assert_eq!(parsed.get(&200).unwrap().lat, 48.0);
    }

    #[test]
    fn parse_skips_elements_without_matching_lcd_tag() {
        let elements = vec![OverpassElement {
            kind: "node".to_string(),
            id: 3,
            lat: Some(1.0),
            lon: Some(1.0),
            center: None,
            tags: Map::new(),
        }];
        assert!(StrategyId::NodeTag.parse(&elements, 58, 1).is_empty());
    }
}
