use chrono::NaiveDate;
use clap::{Args, Subcommand};
use fieldsync_core::{BirthRecord, PregnancyRecord, RecordPayload, Sex, SyncEngine};

use super::CommandError;
use crate::config::Config;

#[derive(Args)]
pub struct RecordCommand {
    #[command(subcommand)]
    pub command: RecordSubcommand,
}

#[derive(Subcommand)]
pub enum RecordSubcommand {
    /// Record a new pregnancy
    Pregnancy {
        /// Mother's full name
        mother: String,

        /// Village or settlement
        #[arg(long)]
        village: String,

        /// Mother's age in years
        #[arg(long)]
        age: Option<u32>,

        /// Last menstrual period (YYYY-MM-DD); also sets the expected delivery date
        #[arg(long)]
        lmp: Option<NaiveDate>,

        /// Expected delivery date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,

        /// Number of pregnancies including this one
        #[arg(long)]
        gravida: Option<u32>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Record a new birth
    Birth {
        /// Mother's full name
        mother: String,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Child's name
        #[arg(long)]
        child: Option<String>,

        /// Child's sex (female, male, unknown)
        #[arg(long, default_value = "unknown")]
        sex: Sex,

        /// Birth weight in grams
        #[arg(long)]
        weight: Option<u32>,

        /// Place of birth
        #[arg(long)]
        place: Option<String>,

        /// Remote id of the matching pregnancy record
        #[arg(long)]
        pregnancy: Option<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },
}

impl RecordSubcommand {
    fn build(&self, recorded_by: &str) -> Result<RecordPayload, CommandError> {
        match self {
            RecordSubcommand::Pregnancy {
                mother,
                village,
                age,
                lmp,
                due,
                gravida,
                notes,
            } => {
                let mother = required("Mother name", mother)?;
                let mut record = PregnancyRecord::new(mother, village.trim(), recorded_by);

                if let Some(age) = age {
                    record = record.with_mother_age(*age);
                }
                if let Some(due) = due {
                    record = record.with_expected_delivery_date(*due);
                }
                if let Some(lmp) = lmp {
                    record = record.with_last_menstrual_period(*lmp);
                }
                if let Some(gravida) = gravida {
                    record = record.with_gravida(*gravida);
                }
                if let Some(notes) = notes {
                    record = record.with_notes(notes);
                }
                Ok(record.into())
            }

            RecordSubcommand::Birth {
                mother,
                date,
                child,
                sex,
                weight,
                place,
                pregnancy,
                notes,
            } => {
                let mother = required("Mother name", mother)?;
                let mut record = BirthRecord::new(mother, *date, recorded_by).with_sex(*sex);

                if let Some(child) = child {
                    record = record.with_child_name(child.trim());
                }
                if let Some(weight) = weight {
                    record = record.with_birth_weight(*weight);
                }
                if let Some(place) = place {
                    record = record.with_place_of_birth(place.trim());
                }
                if let Some(pregnancy) = pregnancy {
                    record = record.with_pregnancy_id(pregnancy.trim());
                }
                if let Some(notes) = notes {
                    record = record.with_notes(notes);
                }
                Ok(record.into())
            }
        }
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, CommandError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CommandError::Invalid(format!("{} cannot be empty", field)));
    }
    Ok(value)
}

impl RecordCommand {
    pub async fn run(&self, engine: &SyncEngine, config: &Config) -> Result<(), CommandError> {
        let payload = self.command.build(&config.recorded_by)?;
        let entry = engine.enqueue(payload).await?;

        println!("Queued {} record:", entry.record_type);
        println!("  {}", entry.payload);
        println!("  id: local:{}", entry.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::RecordType;

    #[test]
    fn test_build_pregnancy_derives_due_date() {
        let cmd = RecordSubcommand::Pregnancy {
            mother: " Grace ".to_string(),
            village: "Kisoro".to_string(),
            age: Some(24),
            lmp: NaiveDate::from_ymd_opt(2025, 1, 1),
            due: None,
            gravida: Some(2),
            notes: None,
        };

        let payload = cmd.build("agent-7").unwrap();
        assert_eq!(payload.record_type(), RecordType::Pregnancy);
        assert_eq!(payload.recorded_by(), "agent-7");
        match payload {
            RecordPayload::Pregnancy(p) => {
                assert_eq!(p.mother_name, "Grace");
                assert!(p.expected_delivery_date.is_some());
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_build_birth() {
        let cmd = RecordSubcommand::Birth {
            mother: "Amina".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            child: Some("Zawadi".to_string()),
            sex: Sex::Female,
            weight: Some(3200),
            place: None,
            pregnancy: Some("doc7".to_string()),
            notes: None,
        };

        match cmd.build("agent-7").unwrap() {
            RecordPayload::Birth(b) => {
                assert_eq!(b.child_name.as_deref(), Some("Zawadi"));
                assert_eq!(b.sex, Sex::Female);
                assert_eq!(b.birth_weight_grams, Some(3200));
                assert_eq!(b.pregnancy_id.as_deref(), Some("doc7"));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_empty_mother_name_rejected() {
        let cmd = RecordSubcommand::Birth {
            mother: "  ".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            child: None,
            sex: Sex::Unknown,
            weight: None,
            place: None,
            pregnancy: None,
            notes: None,
        };

        assert!(matches!(cmd.build("agent-7"), Err(CommandError::Invalid(_))));
    }
}
