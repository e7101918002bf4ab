use crate::classify::placeholder_image;
use crate::models::{Concert, ConcertSource, TIME_TBA};

fn entry(id: &str, title: &str, venue: &str, date: &str, description: &str, label: &str) -> Concert {
    Concert {
        id: id.to_string(),
        title: title.to_string(),
        venue: venue.to_string(),
        date: date.to_string(),
        time: TIME_TBA.to_string(),
        duration: None,
        description: description.to_string(),
        images: Vec::new(),
        image: placeholder_image(label),
        has_images: false,
        links: Vec::new(),
        ticket_url: None,
        is_placeholder: true,
        source: ConcertSource::StaticFallback,
        original_event: None,
    }
}

pub fn upcoming() -> Vec<Concert> {
    vec![entry(
        "static-upcoming-1",
        "Summer Festival 2025",
        "Stockholm Concert Hall",
        "June 15, 2025",
        "Annual summer music festival featuring contemporary Nordic compositions.",
        "Summer Festival",
    )]
}

pub fn past() -> Vec<Concert> {
    vec![
        entry(
            "static-past-1",
            "Idol Kvalfinal 2022",
            "TV4",
            "19 September 2022",
            "Performance in the qualification final of Swedish Idol 2022.",
            "Idol Kvalfinal",
        ),
        entry(
            "static-past-2",
            "Mejeriet Lund 2024",
            "Mejeriet, Lund",
            "9 Februari 2024",
            "Performance at Mejeriet Lund, one of Sweden's premier live music venues.",
            "Mejeriet Lund",
        ),
        entry(
            "static-past-3",
            "Jamboree 2022",
            "Jamboree",
            "7 Augusti 2022",
            "Performance at Jamboree 2022.",
            "Jamboree 2022",
        ),
        entry(
            "static-past-4",
            "Lundakarnevalen 2022",
            "Lund",
            "22 Maj 2022",
            "Performance at Lundakarnevalen 2022.",
            "Lundakarnevalen",
        ),
        entry(
            "static-past-5",
            "Torsjö Live 2024",
            "Torsjö",
            "2024",
            "Performance at Torsjö Live 2024, continuing the tradition of this beloved annual event.",
            "Torsjö Live 2024",
        ),
        entry(
            "static-past-6",
            "Hässleholmsfestivalen 2022",
            "Hässleholm",
            "2022",
            "Performance at Hässleholmsfestivalen 2022.",
            "Hässleholmsfestivalen",
        ),
        entry(
            "static-past-7",
            "Lunds Nation NSA 2025",
            "Lunds Nation",
            "30 April 2025",
            "Performance at Lunds Nation NSA event.",
            "Lunds Nation NSA",
        ),
        entry(
            "static-past-8",
            "Penthouse Lunds Nation Valborg",
            "Lunds Nation",
            "Valborg 2023",
            "Special Valborg performance at Penthouse, Lunds Nation.",
            "Penthouse Valborg",
        ),
        entry(
            "static-past-9",
            "Himlakull Kaffe 2025",
            "Himlakull",
            "15 Januari 2025",
            "Intimate performance at Himlakull Kaffe.",
            "Himlakull Kaffe",
        ),
    ]
}
