use crate::models::employee::EmployeeProfile;
use crate::models::job::BulkJob;
use crate::services::generation::GenerationRequest;

/// Most skills forwarded to the backend for a single course.
const MAX_SKILLS: usize = 10;

/// Embed the employee into the job's base title and description.
pub fn personalize(job: &BulkJob, profile: &EmployeeProfile) -> GenerationRequest {
    let title = format!("{} for {}", job.title.trim(), profile.name.trim());

    let base = job
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("A personalized course on {}.", job.title.trim()));

    let description = match role_sentence(profile) {
        Some(sentence) => format!("{} {}", base, sentence),
        None => base,
    };

    GenerationRequest {
        employee_id: profile.id,
        title,
        description,
        difficulty_level: job.difficulty_level,
        skills_to_address: skills_to_address(&profile.skills),
    }
}

fn role_sentence(profile: &EmployeeProfile) -> Option<String> {
    let position = non_blank(profile.position.as_deref());
    let department = non_blank(profile.department.as_deref());

    let role = match (position, department) {
        (Some(p), Some(d)) => format!("{} in {}", p, d),
        (Some(p), None) => p.to_string(),
        (None, Some(d)) => format!("a member of {}", d),
        (None, None) => return None,
    };

    let mut sentence = format!("Tailored for {}, {}", profile.name.trim(), role);
    if let Some(experience) = non_blank(profile.experience.as_deref()) {
        sentence.push_str(&format!(" with {} of experience", experience));
    }
    sentence.push('.');
    Some(sentence)
}

fn skills_to_address(skills: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for skill in skills.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(skill)) {
            out.push(skill.to_string());
        }
        if out.len() == MAX_SKILLS {
            break;
        }
    }
    out
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
