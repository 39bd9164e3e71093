use crate::filters::FilterPredicate;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Active filter chips plus pagination, one line
pub fn filter_line(filters: &FilterPredicate, total: Option<u64>) -> Line<'static> {
  let key_style = Style::default().fg(Color::Cyan);
  let label_style = Style::default().fg(Color::DarkGray);
  let on = Style::default().fg(Color::Black).bg(Color::Cyan);
  let off = Style::default().fg(Color::Gray);

  let mut spans = vec![Span::raw(" ")];
  let mut chip = |key: &'static str, label: &'static str, value: Option<String>| {
    spans.push(Span::styled(format!("<{}>", key), key_style));
    spans.push(Span::styled(format!(" {} ", label), label_style));
    match value {
      Some(value) => spans.push(Span::styled(format!(" {} ", value), on)),
      None => spans.push(Span::styled(" any ", off)),
    }
    spans.push(Span::raw("  "));
  };

  chip("c", "category", filters.category.map(|c| c.label().to_string()));
  chip(
    "v",
    "favorites",
    filters
      .is_favorite
      .map(|f| (if f { "only" } else { "excluded" }).to_string()),
  );
  chip("s", "status", filters.status.map(|s| s.label().to_string()));

  if filters.date_from.is_some() || filters.date_to.is_some() {
    let from = filters.date_from.map(|d| d.to_string()).unwrap_or_default();
    let to = filters.date_to.map(|d| d.to_string()).unwrap_or_default();
    spans.push(Span::styled(format!("{}..{}  ", from, to), label_style));
  }

  let page = match total {
    Some(total) => {
      let pages = total.div_ceil(u64::from(filters.page_size)).max(1);
      format!("page {}/{}", filters.page, pages)
    }
    None => format!("page {}", filters.page),
  };
  spans.push(Span::styled("<n/p> ", key_style));
  spans.push(Span::raw(page));

  Line::from(spans)
}

pub fn draw_filter_bar(frame: &mut Frame, area: Rect, filters: &FilterPredicate, total: Option<u64>) {
  frame.render_widget(Paragraph::new(filter_line(filters, total)), area);
}
