//! Plain-text output for the terminal.

use cb_core::{CommentTree, CommentView, ConfessionView, Polarity, Tally};
use cb_services::{Resolution, ResolutionSource};

pub fn resolution(resolution: &Resolution) {
    let source = match resolution.source {
        ResolutionSource::Cache => "device cache",
        ResolutionSource::Remote => "found by device fingerprint",
        ResolutionSource::Created => "newly created",
        ResolutionSource::Adopted => "created concurrently by another session",
        ResolutionSource::Fallback => "offline fallback",
    };
    println!("Anonymous #{} ({source})", resolution.identity.id);
}

fn tally(tally: &Tally) -> String {
    let mine = match tally.viewer_reaction {
        Some(Polarity::Like) => " [you liked]",
        Some(Polarity::Dislike) => " [you disliked]",
        None => "",
    };
    format!("+{} -{}{mine}", tally.likes_count, tally.dislikes_count)
}

pub fn confession(view: &ConfessionView) {
    let c = &view.confession;
    println!(
        "{}  Anonymous #{}  {}",
        c.id,
        c.author_id,
        c.created_at.format("%Y-%m-%d %H:%M")
    );
    if let Some(content) = &c.content {
        println!("  {content}");
    }
    for item in &c.media {
        println!("  [{:?}] {}", item.kind, item.url);
    }
    println!("  {}  {} comment(s)", tally(&view.tally), view.comments_count);
}

pub fn feed(views: &[ConfessionView]) {
    if views.is_empty() {
        println!("No confessions yet.");
    }
    for view in views {
        confession(view);
        println!();
    }
}

fn comment_line(view: &CommentView, indent: &str) {
    let c = &view.comment;
    println!("{indent}{}  Anonymous #{}: {}", c.id, c.author_id, c.content);
    println!("{indent}  {}", tally(&view.tally));
}

pub fn thread(trees: &[CommentTree]) {
    if trees.is_empty() {
        println!("No comments yet.");
    }
    for tree in trees {
        comment_line(&tree.parent, "");
        for reply in &tree.replies {
            comment_line(reply, "    ");
        }
    }
}

pub fn comment(view: &CommentView) {
    comment_line(view, "");
}
