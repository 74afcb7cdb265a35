//! Page content: the editable sections and their structured entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{FieldIssue, UserId};

const MAX_SHORT_TEXT: usize = 200;
const MAX_LONG_TEXT: usize = 10_000;
const MAX_LIST_LEN: usize = 100;
pub const MAX_SKILL_LEVEL: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Experience {
    pub role: String,
    pub company: String,
    pub period: String,
    pub location: String,
    pub achievements: Vec<String>,
    pub highlight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    /// Proficiency in `0..=100`.
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillCategory {
    pub category: String,
    pub icon: String,
    pub skills: Vec<Skill>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Achievement {
    pub title: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

/// Every editable field of the page, grouped by section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentFields {
    pub hero_title: String,
    pub hero_subtitle: String,
    pub hero_description: String,
    pub hero_image: String,

    pub about_title: String,
    pub about_description: String,
    pub about_highlights: Vec<String>,

    pub experience_title: String,
    pub experiences: Vec<Experience>,

    pub skills_title: String,
    pub skill_categories: Vec<SkillCategory>,

    pub achievements_title: String,
    pub achievements: Vec<Achievement>,

    pub contact_title: String,
    pub contact_description: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub contact_location: String,
    pub social_links: Vec<SocialLink>,
    pub cv_url: String,
}

impl ContentFields {
    /// Placeholder page used when the site starts with no content at all.
    #[must_use]
    pub fn seed() -> Self {
        Self {
            hero_title: "Hello, I'm a developer".to_string(),
            hero_subtitle: "Software Engineer".to_string(),
            hero_description: "I build reliable software for the web.".to_string(),
            about_title: "About me".to_string(),
            about_description: "Tell visitors who you are and what you do.".to_string(),
            experience_title: "Experience".to_string(),
            skills_title: "Skills".to_string(),
            achievements_title: "Achievements".to_string(),
            contact_title: "Get in touch".to_string(),
            contact_description: "Have a project in mind? Send me a message.".to_string(),
            ..Self::default()
        }
    }

    /// Shallow merge: every field the patch carries replaces the current value.
    pub fn apply(&mut self, patch: ContentPatch) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = patch.$field {
                    self.$field = value;
                })*
            };
        }

        merge!(
            hero_title,
            hero_subtitle,
            hero_description,
            hero_image,
            about_title,
            about_description,
            about_highlights,
            experience_title,
            experiences,
            skills_title,
            skill_categories,
            achievements_title,
            achievements,
            contact_title,
            contact_description,
            contact_email,
            contact_phone,
            contact_location,
            social_links,
            cv_url,
        );
    }
}

/// A partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hero_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hero_subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hero_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hero_image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub about_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about_highlights: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiences: Option<Vec<Experience>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_categories: Option<Vec<SkillCategory>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievements_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Vec<Achievement>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_links: Option<Vec<SocialLink>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_url: Option<String>,
}

impl ContentPatch {
    /// Keeps only the fields belonging to `section`; everything else is dropped.
    #[must_use]
    pub fn restrict_to(self, section: Section) -> Self {
        match section {
            Section::Hero => Self {
                hero_title: self.hero_title,
                hero_subtitle: self.hero_subtitle,
                hero_description: self.hero_description,
                hero_image: self.hero_image,
                ..Self::default()
            },
            Section::About => Self {
                about_title: self.about_title,
                about_description: self.about_description,
                about_highlights: self.about_highlights,
                ..Self::default()
            },
            Section::Experience => Self {
                experience_title: self.experience_title,
                experiences: self.experiences,
                ..Self::default()
            },
            Section::Skills => Self {
                skills_title: self.skills_title,
                skill_categories: self.skill_categories,
                ..Self::default()
            },
            Section::Achievements => Self {
                achievements_title: self.achievements_title,
                achievements: self.achievements,
                ..Self::default()
            },
            Section::Contact => Self {
                contact_title: self.contact_title,
                contact_description: self.contact_description,
                contact_email: self.contact_email,
                contact_phone: self.contact_phone,
                contact_location: self.contact_location,
                social_links: self.social_links,
                cv_url: self.cv_url,
                ..Self::default()
            },
        }
    }

    /// Checks every supplied field, collecting all problems instead of
    /// stopping at the first one.
    pub fn validate(&self) -> Result<(), Vec<FieldIssue>> {
        let mut issues = Vec::new();

        let short_text = [
            ("heroTitle", &self.hero_title),
            ("heroSubtitle", &self.hero_subtitle),
            ("heroImage", &self.hero_image),
            ("aboutTitle", &self.about_title),
            ("experienceTitle", &self.experience_title),
            ("skillsTitle", &self.skills_title),
            ("achievementsTitle", &self.achievements_title),
            ("contactTitle", &self.contact_title),
            ("contactEmail", &self.contact_email),
            ("contactPhone", &self.contact_phone),
            ("contactLocation", &self.contact_location),
            ("cvUrl", &self.cv_url),
        ];
        for (field, value) in short_text {
            check_len(&mut issues, field, value.as_deref(), MAX_SHORT_TEXT);
        }

        let long_text = [
            ("heroDescription", &self.hero_description),
            ("aboutDescription", &self.about_description),
            ("contactDescription", &self.contact_description),
        ];
        for (field, value) in long_text {
            check_len(&mut issues, field, value.as_deref(), MAX_LONG_TEXT);
        }

        if let Some(highlights) = &self.about_highlights {
            check_list_len(&mut issues, "aboutHighlights", highlights.len());
            for (i, h) in highlights.iter().enumerate() {
                check_len(
                    &mut issues,
                    &format!("aboutHighlights[{i}]"),
                    Some(h),
                    MAX_LONG_TEXT,
                );
            }
        }

        if let Some(experiences) = &self.experiences {
            check_list_len(&mut issues, "experiences", experiences.len());
            for (i, exp) in experiences.iter().enumerate() {
                check_required(&mut issues, &format!("experiences[{i}].role"), &exp.role);
                check_required(
                    &mut issues,
                    &format!("experiences[{i}].company"),
                    &exp.company,
                );
                check_list_len(
                    &mut issues,
                    &format!("experiences[{i}].achievements"),
                    exp.achievements.len(),
                );
            }
        }

        if let Some(categories) = &self.skill_categories {
            check_list_len(&mut issues, "skillCategories", categories.len());
            for (i, cat) in categories.iter().enumerate() {
                check_required(
                    &mut issues,
                    &format!("skillCategories[{i}].category"),
                    &cat.category,
                );
                check_list_len(
                    &mut issues,
                    &format!("skillCategories[{i}].skills"),
                    cat.skills.len(),
                );
                for (j, skill) in cat.skills.iter().enumerate() {
                    let prefix = format!("skillCategories[{i}].skills[{j}]");
                    check_required(&mut issues, &format!("{prefix}.name"), &skill.name);
                    if skill.level > MAX_SKILL_LEVEL {
                        issues.push(FieldIssue::new(
                            format!("{prefix}.level"),
                            format!("must be between 0 and {MAX_SKILL_LEVEL}"),
                        ));
                    }
                }
            }
        }

        if let Some(achievements) = &self.achievements {
            check_list_len(&mut issues, "achievements", achievements.len());
            for (i, a) in achievements.iter().enumerate() {
                check_required(&mut issues, &format!("achievements[{i}].title"), &a.title);
            }
        }

        if let Some(links) = &self.social_links {
            check_list_len(&mut issues, "socialLinks", links.len());
            for (i, link) in links.iter().enumerate() {
                check_required(
                    &mut issues,
                    &format!("socialLinks[{i}].platform"),
                    &link.platform,
                );
                if !is_link(&link.url) {
                    issues.push(FieldIssue::new(
                        format!("socialLinks[{i}].url"),
                        "must start with http://, https:// or mailto:",
                    ));
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

impl From<ContentFields> for ContentPatch {
    fn from(f: ContentFields) -> Self {
        Self {
            hero_title: Some(f.hero_title),
            hero_subtitle: Some(f.hero_subtitle),
            hero_description: Some(f.hero_description),
            hero_image: Some(f.hero_image),
            about_title: Some(f.about_title),
            about_description: Some(f.about_description),
            about_highlights: Some(f.about_highlights),
            experience_title: Some(f.experience_title),
            experiences: Some(f.experiences),
            skills_title: Some(f.skills_title),
            skill_categories: Some(f.skill_categories),
            achievements_title: Some(f.achievements_title),
            achievements: Some(f.achievements),
            contact_title: Some(f.contact_title),
            contact_description: Some(f.contact_description),
            contact_email: Some(f.contact_email),
            contact_phone: Some(f.contact_phone),
            contact_location: Some(f.contact_location),
            social_links: Some(f.social_links),
            cv_url: Some(f.cv_url),
        }
    }
}

fn check_len(issues: &mut Vec<FieldIssue>, field: &str, value: Option<&str>, max: usize) {
    if let Some(v) = value
        && v.chars().count() > max
    {
        issues.push(FieldIssue::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
}

fn check_required(issues: &mut Vec<FieldIssue>, field: &str, value: &str) {
    if value.trim().is_empty() {
        issues.push(FieldIssue::new(field, "is required"));
    } else if value.chars().count() > MAX_SHORT_TEXT {
        issues.push(FieldIssue::new(
            field,
            format!("must be at most {MAX_SHORT_TEXT} characters"),
        ));
    }
}

fn check_list_len(issues: &mut Vec<FieldIssue>, field: &str, len: usize) {
    if len > MAX_LIST_LEN {
        issues.push(FieldIssue::new(
            field,
            format!("must contain at most {MAX_LIST_LEN} entries"),
        ));
    }
}

fn is_link(url: &str) -> bool {
    ["http://", "https://", "mailto:"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

/// A named group of fields rendered as one area of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Hero,
    About,
    Experience,
    Skills,
    Achievements,
    Contact,
}

impl Section {
    pub const ALL: [Self; 6] = [
        Self::Hero,
        Self::About,
        Self::Experience,
        Self::Skills,
        Self::Achievements,
        Self::Contact,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::About => "about",
            Self::Experience => "experience",
            Self::Skills => "skills",
            Self::Achievements => "achievements",
            Self::Contact => "contact",
        }
    }

    /// Wire names of the fields this section may touch.
    #[must_use]
    pub const fn fields(&self) -> &'static [&'static str] {
        match self {
            Self::Hero => &["heroTitle", "heroSubtitle", "heroDescription", "heroImage"],
            Self::About => &["aboutTitle", "aboutDescription", "aboutHighlights"],
            Self::Experience => &["experienceTitle", "experiences"],
            Self::Skills => &["skillsTitle", "skillCategories"],
            Self::Achievements => &["achievementsTitle", "achievements"],
            Self::Contact => &[
                "contactTitle",
                "contactDescription",
                "contactEmail",
                "contactPhone",
                "contactLocation",
                "socialLinks",
                "cvUrl",
            ],
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown section: {0}")]
pub struct UnknownSection(pub String);

impl FromStr for Section {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}

/// The live content record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: i32,
    #[serde(flatten)]
    pub fields: ContentFields,
    pub version: i32,
    pub is_active: bool,
    pub last_modified_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable copy of a content record taken right before it was changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBackup {
    pub id: i32,
    pub content_id: i32,
    /// Version of the content at snapshot time.
    pub version: i32,
    #[serde(flatten)]
    pub fields: ContentFields,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}
