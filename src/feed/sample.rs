//! Built-in demo articles shown when no feed could be loaded.

use chrono::{Duration, Utc};

use super::NewsItem;

struct SampleArticle {
    title: &'static str,
    link: &'static str,
    description: &'static str,
    author: &'static str,
    source_name: &'static str,
    image: &'static str,
}

const SAMPLES: [SampleArticle; 8] = [
    SampleArticle {
        title: "Welcome to newsdesk",
        link: "https://rss.pages.ninja",
        description: "A terminal news aggregator with a reader mode. When live RSS feeds are available, you'll see real news here. This demo shows how the listing looks with multiple articles from different sources.",
        author: "newsdesk",
        source_name: "Demo Content",
        image: "https://images.unsplash.com/photo-1611224923853-80b023f02d71?w=800&h=400&fit=crop&crop=entropy",
    },
    SampleArticle {
        title: "React 18 Concurrent Features Explained",
        link: "https://react.dev/blog",
        description: "React 18 introduced several groundbreaking features including concurrent rendering, automatic batching, and new hooks like useId and useDeferredValue that make building user interfaces more efficient and responsive.",
        author: "React Team",
        source_name: "React News",
        image: "https://images.unsplash.com/photo-1633356122544-f134324a6cee?w=800&h=400&fit=crop&crop=entropy",
    },
    SampleArticle {
        title: "TypeScript 5.0: New Features and Improvements",
        link: "https://typescriptlang.org/announcements",
        description: "TypeScript 5.0 brings decorator support, better type inference, improved performance, and new features that make JavaScript development more productive and type-safe.",
        author: "TypeScript Team",
        source_name: "TypeScript Blog",
        image: "https://images.unsplash.com/photo-1516116216624-53e697fedbea?w=800&h=400&fit=crop&crop=entropy",
    },
    SampleArticle {
        title: "Building Mobile-First Progressive Web Apps",
        link: "https://web.dev/progressive-web-apps",
        description: "Learn how to create responsive web applications that provide excellent user experience across all device sizes, starting with mobile-first design principles and progressive enhancement.",
        author: "Google Web Team",
        source_name: "Web Development",
        image: "https://images.unsplash.com/photo-1512941937669-90a1b58e7e9c?w=800&h=400&fit=crop&crop=entropy",
    },
    SampleArticle {
        title: "Modern CSS Grid and Flexbox Techniques",
        link: "https://css-tricks.com/snippets/css/complete-guide-grid",
        description: "Explore the latest CSS layout techniques including CSS Grid, Flexbox, and container queries that are revolutionizing responsive web design.",
        author: "CSS-Tricks Team",
        source_name: "CSS News",
        image: "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=800&h=400&fit=crop&crop=entropy",
    },
    SampleArticle {
        title: "Vite vs Create React App: Performance Comparison",
        link: "https://vitejs.dev/guide/why.html",
        description: "Discover why Vite offers superior development experience with lightning-fast hot module replacement, optimized builds, and better developer experience compared to traditional bundlers.",
        author: "Vite Team",
        source_name: "Build Tools",
        image: "https://images.unsplash.com/photo-1461749280684-dccba630e2f6?w=800&h=400&fit=crop&crop=entropy",
    },
    SampleArticle {
        title: "Accessibility Best Practices",
        link: "https://www.a11yproject.com",
        description: "Essential accessibility guidelines and techniques to ensure your web applications are usable by everyone, including users with disabilities. Learn about ARIA, semantic HTML, and testing strategies.",
        author: "A11Y Project",
        source_name: "Accessibility",
        image: "https://images.unsplash.com/photo-1559526324-4b87b5e36e44?w=800&h=400&fit=crop&crop=entropy",
    },
    SampleArticle {
        title: "GitHub Actions CI/CD Pipeline Setup",
        link: "https://docs.github.com/en/actions",
        description: "Step-by-step guide to setting up automated deployment pipelines with GitHub Actions, including testing, building, and deploying to GitHub Pages with custom domains.",
        author: "GitHub Team",
        source_name: "DevOps",
        image: "https://images.unsplash.com/photo-1556075798-4825dfaaf498?w=800&h=400&fit=crop&crop=entropy",
    },
];

/// Source URL recorded on every sample item.
pub const SAMPLE_SOURCE: &str = "demo";

/// The eight demo articles, newest first, spaced one hour apart ending now.
pub fn sample_items() -> Vec<NewsItem> {
    let now = Utc::now();
    SAMPLES
        .iter()
        .enumerate()
        .map(|(i, s)| NewsItem {
            title: s.title.to_string(),
            link: s.link.to_string(),
            description: s.description.to_string(),
            pub_date: now - Duration::hours(i as i64),
            author: Some(s.author.to_string()),
            source: SAMPLE_SOURCE.to_string(),
            source_name: s.source_name.to_string(),
            image: Some(s.image.to_string()),
            categories: Vec::new(),
        })
        .collect()
}
