use crate::{
    error::AppResult,
    feed_interface::FeedInterface,
    models::{NewGroup, NewPost},
};
use tracing::info;

const SAMPLE_USERS: [&str; 3] = ["leo", "anna", "ivan"];

const SAMPLE_GROUPS: [(&str, &str, &str); 2] = [
    ("Novels", "novels", "Long-form fiction and chapters in progress"),
    ("Travel notes", "travel", "Short reports from the road"),
];

/// Demo users, groups, posts and follows. Does nothing if the users already exist.
pub async fn seed_sample_data(feed: &FeedInterface) -> AppResult<()> {
    let store = feed.store();
    if store.get_user_by_username(SAMPLE_USERS[0]).await?.is_some() {
        info!("sample data already present, skipping seed");
        return Ok(());
    }

    let posts = feed.post_service();
    let mut users = Vec::with_capacity(SAMPLE_USERS.len());
    for username in SAMPLE_USERS {
        users.push(posts.register_user(username).await?);
    }

    let mut groups = Vec::with_capacity(SAMPLE_GROUPS.len());
    for (title, slug, description) in SAMPLE_GROUPS {
        groups.push(
            posts
                .create_group(NewGroup {
                    title: title.to_string(),
                    slug: slug.to_string(),
                    description: description.to_string(),
                })
                .await?,
        );
    }

    // Enough posts for the global feed to span more than one page
    let mut new_posts = Vec::new();
    for (n, user) in users.iter().enumerate() {
        for i in 0..6 {
            let group_id = match (n + i) % 3 {
                0 => None,
                k => Some(groups[k - 1].id),
            };
            new_posts.push(NewPost {
                author_id: user.id,
                text: format!("Sample post {} by {}", i + 1, user.username),
                group_id,
                image: None,
            });
        }
    }
    let created = store.create_posts(new_posts).await?;

    let follows = feed.follow_graph();
    follows.follow(users[0].id, users[1].id).await?;
    follows.follow(users[1].id, users[2].id).await?;
    follows.follow(users[2].id, users[0].id).await?;

    info!(
        users = users.len(),
        groups = groups.len(),
        posts = created.len(),
        "sample data seeded"
    );
    Ok(())
}
