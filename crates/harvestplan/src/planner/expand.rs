//! Expansion of the field collection into harvest-round work items.

use tracing::{debug, warn};

use super::schedule::PlanWarning;
use super::scheduler::WorkItem;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::estimate::Estimates;
use crate::fields::FieldCollection;

/// Work items in scheduling order plus the fields that had to be left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    /// Items to schedule.
    pub items: Vec<WorkItem>,
    /// One `NoEstimate` warning per field without hours.
    pub warnings: Vec<PlanWarning>,
}

/// Expand every field into rounds `1..=harvest_rounds`.
///
/// Fields are taken in schedule order. Hours come from the field itself or,
/// failing that, from `estimates`. A configured `harvest_round_order` moves
/// the listed rounds to the front.
///
/// # Errors
///
/// Returns an error if a field's hours (explicit or estimated) are negative
/// or not finite.
pub fn expand_fields(
    fields: &FieldCollection,
    config: &Config,
    estimates: &Estimates,
) -> Result<Expansion> {
    let mut expansion = Expansion::default();

    for field in fields.in_schedule_order() {
        if field.harvest_rounds == 0 {
            debug!("Field {} ({}) has no harvest rounds", field.field, field.variety);
            continue;
        }

        let hours = field.hours.or_else(|| {
            estimates
                .get(&(field.field.clone(), field.variety.clone()))
                .copied()
        });
        let Some(hours) = hours else {
            warn!(
                "No hours for field {} ({}), skipping",
                field.field, field.variety
            );
            expansion.warnings.push(PlanWarning::NoEstimate {
                field: field.field.clone(),
                variety: field.variety.clone(),
            });
            continue;
        };
        if !hours.is_finite() || hours < 0.0 {
            return Err(Error::InvalidHours {
                field: field.field.clone(),
                hours,
            });
        }

        let group = config.group_for(&field.variety);
        for round in 1..=field.harvest_rounds {
            expansion.items.push(
                WorkItem::new(&field.field, &field.variety, group, hours).with_round(round),
            );
        }
    }

    apply_round_order(&mut expansion.items, config);
    Ok(expansion)
}

/// Move the rounds listed in `harvest_round_order` to the front, in list order.
fn apply_round_order(items: &mut Vec<WorkItem>, config: &Config) {
    let order = &config.schedule.harvest_round_order;
    if order.is_empty() {
        return;
    }

    let mut rest = std::mem::take(items);
    for entry in order {
        let before = items.len();
        let mut i = 0;
        while i < rest.len() {
            if rest[i].field == entry.field && rest[i].harvest_round == entry.round {
                items.push(rest.remove(i));
            } else {
                i += 1;
            }
        }
        if items.len() == before {
            debug!(
                "harvest_round_order entry {} round {} matches no field",
                entry.field, entry.round
            );
        }
    }
    items.append(&mut rest);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoundRef;
    use crate::fields::Field;

    fn fields() -> FieldCollection {
        FieldCollection::from_fields([
            Field::new("Wiese 1", "Gala").with_rounds(2).with_hours(10.0),
            Field::new("Wiese 2", "Topaz").with_order(1),
            Field::new("Wiese 3", "Elstar").with_rounds(0).with_hours(5.0),
        ])
        .unwrap()
    }

    fn estimates() -> Estimates {
        [(("Wiese 2".to_string(), "Topaz".to_string()), 30.0)]
            .into_iter()
            .collect()
    }

    fn labels(items: &[WorkItem]) -> Vec<(String, u32)> {
        items
            .iter()
            .map(|i| (i.field.clone(), i.harvest_round))
            .collect()
    }

    #[test]
    fn test_expand_in_order_with_rounds() {
        let expansion = expand_fields(&fields(), &Config::default(), &estimates()).unwrap();

        assert_eq!(
            labels(&expansion.items),
            vec![
                ("Wiese 2".to_string(), 1),
                ("Wiese 1".to_string(), 1),
                ("Wiese 1".to_string(), 2),
            ]
        );
        assert_eq!(expansion.items[0].hours, 30.0);
        assert_eq!(expansion.items[1].hours, 10.0);
        assert!(expansion.warnings.is_empty());
    }

    #[test]
    fn test_group_from_variety_map() {
        let mut config = Config::default();
        config
            .variety_groups
            .insert("Gala".to_string(), "früh".to_string());

        let expansion = expand_fields(&fields(), &config, &estimates()).unwrap();
        assert_eq!(expansion.items[0].group, "Topaz");
        assert_eq!(expansion.items[1].group, "früh");
    }

    #[test]
    fn test_missing_estimate_warns() {
        let expansion = expand_fields(&fields(), &Config::default(), &Estimates::new()).unwrap();

        assert_eq!(expansion.items.len(), 2);
        assert_eq!(
            expansion.warnings,
            vec![PlanWarning::NoEstimate {
                field: "Wiese 2".to_string(),
                variety: "Topaz".to_string(),
            }]
        );
    }

    #[test]
    fn test_explicit_hours_win_over_estimate() {
        let mut estimates = estimates();
        estimates.insert(("Wiese 1".to_string(), "Gala".to_string()), 99.0);

        let expansion = expand_fields(&fields(), &Config::default(), &estimates).unwrap();
        assert_eq!(expansion.items[1].hours, 10.0);
    }

    #[test]
    fn test_negative_estimate_rejected() {
        let estimates: Estimates = [(("Wiese 2".to_string(), "Topaz".to_string()), -3.0)]
            .into_iter()
            .collect();
        let err = expand_fields(&fields(), &Config::default(), &estimates).unwrap_err();
        assert!(matches!(err, Error::InvalidHours { .. }));
    }

    #[test]
    fn test_round_order_override() {
        let mut config = Config::default();
        config.schedule.harvest_round_order = vec![
            RoundRef {
                field: "Wiese 1".to_string(),
                round: 2,
            },
            RoundRef {
                field: "Nowhere".to_string(),
                round: 1,
            },
            RoundRef {
                field: "Wiese 1".to_string(),
                round: 1,
            },
        ];

        let expansion = expand_fields(&fields(), &config, &estimates()).unwrap();
        assert_eq!(
            labels(&expansion.items),
            vec![
                ("Wiese 1".to_string(), 2),
                ("Wiese 1".to_string(), 1),
                ("Wiese 2".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_empty_collection() {
        let expansion =
            expand_fields(&FieldCollection::new(), &Config::default(), &Estimates::new()).unwrap();
        assert!(expansion.items.is_empty());
        assert!(expansion.warnings.is_empty());
    }
}
